//! Console styling: 24-bit gradients, palettes and the startup animation.

use std::{io::Write, time::Duration};

use console::Term;
use rand::Rng;
use tokio::time::sleep;

pub type Rgb = (u8, u8, u8);

pub const MAIN_START: Rgb = (147, 112, 219);
pub const MAIN_END: Rgb = (0, 191, 255);
pub const ALERT: Rgb = (255, 69, 0);
pub const SUCCESS: Rgb = (50, 205, 50);
pub const PROMPT_START: Rgb = (0, 255, 255);
pub const PROMPT_END: Rgb = (135, 206, 250);

const RAIN_CHARS: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789@#$%^&*()_+-=[]{}|;:,.<>?";
const SPARKLES: &[&str] = &["✨", "🚀", "💫", "🌟", "💡", "🔮", "🎉"];

const LOGO: &[&str] = &[
    " _____  ____  ____  ____ ",
    "|_   _|/ ___|/ ___||  _ \\",
    "  | | | |  _| |    | |_) |",
    "  | | | |_| | |___ |  __/",
    "  |_|  \\____|\\____||_|   ",
    "",
    "   ___                          ___              _         ",
    "  / __\\  ___   _ __   _   _    / _ \\  __ _  ___ | |_   ___ ",
    " / /    / _ \\ | '_ \\ | | | |  / /_)/ / _` |/ __|| __| / _ \\",
    "/ /___ | (_) || |_) || |_| | / ___/ | (_| |\\__ \\| |_ |  __/",
    "\\____/  \\___/ | .__/  \\__, | \\/      \\__,_||___/ \\__| \\___|",
    "              |_|     |___/                                ",
];

fn lerp(a: u8, b: u8, t: f32) -> u8 {
    (f32::from(a) + (f32::from(b) - f32::from(a)) * t) as u8
}

/// Color each character along a linear gradient from `start` to `end`.
///
/// Plain text when the terminal has colors disabled.
pub fn gradient(text: &str, start: Rgb, end: Rgb) -> String {
    if !console::colors_enabled() {
        return text.to_string();
    }
    let len = text.chars().count().max(1) as f32;
    let mut out = String::with_capacity(text.len() * 20);
    for (i, ch) in text.chars().enumerate() {
        if ch == '\n' {
            out.push(ch);
            continue;
        }
        let t = i as f32 / len;
        let (r, g, b) = (
            lerp(start.0, end.0, t),
            lerp(start.1, end.1, t),
            lerp(start.2, end.2, t),
        );
        out.push_str(&format!("\x1b[38;2;{r};{g};{b}m{ch}\x1b[0m"));
    }
    out
}

fn with_emoji(text: String, emoji: Option<&str>) -> String {
    match emoji {
        Some(e) => format!("{text} {e}"),
        None => text,
    }
}

pub fn main_text(text: &str, emoji: Option<&str>) -> String {
    with_emoji(gradient(text, MAIN_START, MAIN_END), emoji)
}

pub fn alert(text: &str, emoji: Option<&str>) -> String {
    with_emoji(gradient(text, ALERT, ALERT), emoji)
}

pub fn success(text: &str, emoji: Option<&str>) -> String {
    with_emoji(gradient(text, SUCCESS, SUCCESS), emoji)
}

pub fn prompt(text: &str) -> String {
    gradient(text, PROMPT_START, PROMPT_END)
}

/// Redraw `text` in place with a cycling emoji for `duration`.
pub async fn animated_transition(text: &str, duration: Duration) {
    let frames = (duration.as_millis() / 50).max(1);
    let mut stdout = std::io::stdout();
    for _ in 0..frames {
        let emoji = SPARKLES[rand::rng().random_range(0..SPARKLES.len())];
        print!("\r{}", main_text(text, Some(emoji)));
        let _ = stdout.flush();
        sleep(Duration::from_millis(50)).await;
    }
    println!();
}

/// One frame of falling characters behind the logo.
struct Rain {
    grid: Vec<Vec<char>>,
}

impl Rain {
    fn new(width: usize, height: usize) -> Self {
        Self {
            grid: vec![vec![' '; width]; height],
        }
    }

    fn step(&mut self, rng: &mut impl Rng) {
        let height = self.grid.len();
        let width = self.grid.first().map_or(0, Vec::len);
        for col in 0..width {
            for row in (1..height).rev() {
                self.grid[row][col] = self.grid[row - 1][col];
            }
            self.grid[0][col] = if rng.random_bool(0.2) {
                char::from(RAIN_CHARS[rng.random_range(0..RAIN_CHARS.len())])
            } else {
                ' '
            };
        }
    }
}

/// Rain animation with the logo fading in, then the final logo.
pub async fn intro(term: &Term) {
    const FRAMES: usize = 40;

    let width = LOGO.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let mut rain = Rain::new(width, LOGO.len());

    if term.is_term() {
        let mut rng = rand::rng();
        for frame in 0..FRAMES {
            rain.step(&mut rng);
            let t = frame as f32 / (FRAMES - 1) as f32;
            let logo_color = (
                lerp(MAIN_START.0, MAIN_END.0, t),
                lerp(MAIN_START.1, MAIN_END.1, t),
                lerp(MAIN_START.2, MAIN_END.2, t),
            );

            let mut screen = String::new();
            for (row, line) in LOGO.iter().enumerate() {
                let logo: Vec<char> = line.chars().collect();
                for col in 0..width {
                    match logo.get(col) {
                        Some(&c) if c != ' ' => {
                            screen.push_str(&gradient(&c.to_string(), logo_color, logo_color));
                        }
                        _ => {
                            let tint = if rng.random_bool(0.5) { MAIN_START } else { MAIN_END };
                            screen.push_str(&gradient(&rain.grid[row][col].to_string(), tint, tint));
                        }
                    }
                }
                screen.push('\n');
            }
            let bar = "█".repeat((frame + 1) * 30 / FRAMES);
            screen.push_str(&format!("Loading |{bar:<30}| {}/{FRAMES}\n", frame + 1));

            let _ = term.clear_screen();
            print!("{screen}");
            let _ = std::io::stdout().flush();
            sleep(Duration::from_millis(60)).await;
        }
        let _ = term.clear_screen();
    }

    for line in LOGO {
        println!("{}", main_text(line, None));
    }
}

pub fn intro_text() -> String {
    main_text(
        "
Welcome to the Telegram Copy & Paste relay!
============================================
1. Log in with your API details and bot token (stored encrypted if you like).
2. Add the bot to the groups and channels you want to monitor and forward to.
3. Optionally create profiles (combinations of sources, destinations and filters).
4. Ready? Sit back and let the relay copy messages for you!
",
        None,
    )
}
