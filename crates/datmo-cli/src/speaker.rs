//! Terminal output for proximity announcements.

use colored::Colorize;
use datmo_runtime::Speaker;

pub struct TerminalSpeaker;

impl Speaker for TerminalSpeaker {
    fn speak(&self, text: &str) {
        println!("  {} {}", "🔊".bold(), text.yellow().bold());
    }
}
