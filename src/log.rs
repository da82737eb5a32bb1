use colored::Colorize;

#[derive(Clone, Copy, Debug, Default)]
pub struct Logger {
    verbosity: u8,
    color: bool,
}

impl Logger {
    pub fn new(verbosity: u8, color: bool) -> Self {
        Self { verbosity, color }
    }

    pub fn info(&self, message: &str) {
        if self.color {
            eprintln!("{} {message}", "[*]".blue().bold());
        } else {
            eprintln!("[*] {message}");
        }
    }

    pub fn found(&self, message: &str) {
        if self.color {
            eprintln!("{} {message}", "[+]".green().bold());
        } else {
            eprintln!("[+] {message}");
        }
    }

    pub fn warn(&self, message: &str) {
        if self.color {
            eprintln!("{} {message}", "[!]".yellow().bold());
        } else {
            eprintln!("[!] {message}");
        }
    }

    pub fn error(&self, message: &str) {
        if self.color {
            eprintln!("{} {message}", "[x]".red().bold());
        } else {
            eprintln!("[x] {message}");
        }
    }

    pub fn debug(&self, message: &str) {
        if self.verbosity == 0 {
            return;
        }
        if self.color {
            eprintln!("{} {message}", "[d]".dimmed());
        } else {
            eprintln!("[d] {message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_is_silent_below_verbosity_one() {
        let logger = Logger::new(0, false);
        assert_eq!(logger.verbosity, 0);
    }
}
