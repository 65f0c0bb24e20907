use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{domain::ChatId, errors::Error, filter::MessageFilter, Result};

/// A named forwarding configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub source_chat_ids: Vec<i64>,
    pub destination_channel_ids: Vec<i64>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub blacklist: Vec<String>,
}

/// Raw operator input, one comma separated string per list.
#[derive(Clone, Debug, Default)]
pub struct ProfileInput<'a> {
    pub source_chat_ids: &'a str,
    pub destination_channel_ids: &'a str,
    pub keywords: &'a str,
    pub signature: &'a str,
    pub blacklist: &'a str,
}

impl Profile {
    pub fn new(
        source_chat_ids: Vec<i64>,
        destination_channel_ids: Vec<i64>,
        keywords: Vec<String>,
        signature: String,
        blacklist: Vec<String>,
    ) -> Result<Self> {
        let profile = Self {
            source_chat_ids,
            destination_channel_ids,
            keywords: keywords
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
            signature,
            blacklist: blacklist
                .into_iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        };
        profile.validate()?;
        Ok(profile)
    }

    pub fn from_input(input: &ProfileInput<'_>) -> Result<Self> {
        Self::new(
            parse_chat_ids(input.source_chat_ids, "source chat ids")?,
            parse_chat_ids(input.destination_channel_ids, "destination chat ids")?,
            split_csv(input.keywords),
            input.signature.trim().to_string(),
            split_csv(input.blacklist),
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_chat_ids.is_empty() {
            return Err(Error::Profile("at least one source chat id is required".to_string()));
        }
        if self.destination_channel_ids.is_empty() {
            return Err(Error::Profile(
                "at least one destination chat id is required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn sources(&self) -> Vec<ChatId> {
        self.source_chat_ids.iter().copied().map(ChatId).collect()
    }

    pub fn destinations(&self) -> Vec<ChatId> {
        self.destination_channel_ids.iter().copied().map(ChatId).collect()
    }

    pub fn filter(&self) -> MessageFilter {
        MessageFilter::new(&self.keywords, &self.blacklist)
    }
}

/// Parse a comma separated list of integer chat ids.
pub fn parse_chat_ids(raw: &str, what: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| Error::Profile(format!("invalid {what}: {s:?} is not an integer")))
        })
        .collect()
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// JSON file mapping profile name to [`Profile`], rewritten in full on save.
#[derive(Clone, Debug)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_all(&self) -> Result<BTreeMap<String, Profile>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&text)?)
    }

    pub fn names(&self) -> Result<Vec<String>> {
        Ok(self.load_all()?.into_keys().collect())
    }

    pub fn get(&self, name: &str) -> Result<Option<Profile>> {
        Ok(self.load_all()?.remove(name))
    }

    pub fn save(&self, name: &str, profile: &Profile) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Profile("profile name must not be empty".to_string()));
        }
        profile.validate()?;

        let mut all = self.load_all()?;
        all.insert(name.to_string(), profile.clone());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&all)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}
