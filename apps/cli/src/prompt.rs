//! Interactive duplicate confirmation on the terminal.

use std::io::Write;

use uplink_engine::{DuplicateAction, FileSnapshot};

/// Parses a duplicate answer: `keep`, `skip` or `replace` (or their first
/// letter), with a trailing `!` to apply it to every collision.
pub fn parse_answer(input: &str) -> Option<(DuplicateAction, bool)> {
    let input = input.trim();
    let (word, apply_all) = match input.strip_suffix('!') {
        Some(rest) => (rest.trim_end(), true),
        None => (input, false),
    };
    let action = match word.to_ascii_lowercase().as_str() {
        "k" => DuplicateAction::Keep,
        "s" => DuplicateAction::Skip,
        "r" => DuplicateAction::Replace,
        other => other.parse().ok()?,
    };
    Some((action, apply_all))
}

/// Asks what to do about `file` until a valid answer arrives. End of input
/// skips the file.
pub async fn ask(file: &FileSnapshot) -> anyhow::Result<(DuplicateAction, bool)> {
    let name = file.name.clone();
    tokio::task::spawn_blocking(move || -> anyhow::Result<(DuplicateAction, bool)> {
        let stdin = std::io::stdin();
        loop {
            print!("{name} already exists. [k]eep, [s]kip or [r]eplace (append ! for all): ");
            std::io::stdout().flush()?;

            let mut line = String::new();
            if stdin.read_line(&mut line)? == 0 {
                return Ok((DuplicateAction::Skip, false));
            }
            match parse_answer(&line) {
                Some(answer) => return Ok(answer),
                None => eprintln!("unrecognised answer {:?}", line.trim()),
            }
        }
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_and_long_forms() {
        assert_eq!(parse_answer("k"), Some((DuplicateAction::Keep, false)));
        assert_eq!(parse_answer("Skip\n"), Some((DuplicateAction::Skip, false)));
        assert_eq!(parse_answer(" REPLACE "), Some((DuplicateAction::Replace, false)));
    }

    #[test]
    fn bang_applies_to_all() {
        assert_eq!(parse_answer("s!"), Some((DuplicateAction::Skip, true)));
        assert_eq!(parse_answer("keep !"), Some((DuplicateAction::Keep, true)));
    }

    #[test]
    fn rejects_unknown() {
        assert_eq!(parse_answer(""), None);
        assert_eq!(parse_answer("x"), None);
        assert_eq!(parse_answer("!"), None);
    }
}
