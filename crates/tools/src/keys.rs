use crate::error::ActionError;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Command,
    Control,
    Option,
    Shift,
}

impl Modifier {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "cmd" | "command" | "super" | "meta" | "win" | "windows" | "logo" => {
                Some(Self::Command)
            }
            "ctrl" | "control" | "ctl" => Some(Self::Control),
            "opt" | "option" | "alt" => Some(Self::Option),
            "shift" => Some(Self::Shift),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Command => "cmd",
            Self::Control => "ctrl",
            Self::Option => "opt",
            Self::Shift => "shift",
        }
    }
}

/// A parsed key combination such as `cmd+shift+t`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shortcut {
    pub modifiers: Vec<Modifier>,
    pub key: String,
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in &self.modifiers {
            write!(f, "{}+", modifier.as_str())?;
        }
        f.write_str(&self.key)
    }
}

fn normalize_key(token: &str) -> String {
    match token {
        "enter" | "return" | "ret" => "return".to_string(),
        "esc" | "escape" => "escape".to_string(),
        "space" | "spacebar" | " " => "space".to_string(),
        "del" | "delete" => "delete".to_string(),
        "backspace" | "bksp" => "backspace".to_string(),
        "pgup" | "pageup" => "page_up".to_string(),
        "pgdn" | "pagedown" => "page_down".to_string(),
        "arrowup" => "up".to_string(),
        "arrowdown" => "down".to_string(),
        "arrowleft" => "left".to_string(),
        "arrowright" => "right".to_string(),
        other => other.to_string(),
    }
}

/// Parse `"cmd+shift+t"`, `"Ctrl-C"`, `"enter"` or `"cmd space"`.
///
/// Exactly one non-modifier key is required; modifiers are deduplicated and
/// kept in a fixed order.
pub fn parse_shortcut(input: &str) -> Result<Shortcut, ActionError> {
    let lowered = input.to_lowercase();
    let body = lowered.trim_start();
    if body.trim().is_empty() {
        return Err(ActionError::Malformed("key combination is empty".into()));
    }

    // A separator that directly follows another separator is the key itself:
    // "ctrl+-", "ctrl++", "cmd+ ".
    let (head, trailing_key) = match split_trailing_key(body) {
        Some((head, key)) => (head, Some(key)),
        None => (body.trim_end(), None),
    };

    // A lone "+" or "-" is the key itself, not a separator.
    let tokens: Vec<&str> = if head == "+" || head == "-" {
        vec![head]
    } else {
        head.split(SEPARATORS).filter(|t| !t.is_empty()).collect()
    };
    let has_separator = trailing_key.is_some() || (head.len() > 1 && head.contains(SEPARATORS));

    let mut modifiers = Vec::new();
    let mut key: Option<String> = None;
    let trailing = trailing_key.map(String::from);
    for token in tokens.into_iter().map(str::to_string).chain(trailing) {
        if let Some(modifier) = Modifier::parse(&token) {
            if !modifiers.contains(&modifier) {
                modifiers.push(modifier);
            }
            continue;
        }
        if let Some(existing) = &key {
            return Err(ActionError::Malformed(format!(
                "key combination '{}' names more than one key ('{}' and '{}')",
                input, existing, token
            )));
        }
        key = Some(normalize_key(&token));
    }

    // "shift" alone is a key press of the modifier itself.
    let key = match key {
        Some(key) => key,
        None if modifiers.len() == 1 && !has_separator => {
            let only = modifiers.remove(0);
            only.as_str().to_string()
        }
        None => {
            return Err(ActionError::Malformed(format!(
                "key combination '{}' has no key",
                input
            )))
        }
    };

    modifiers.sort();
    Ok(Shortcut { modifiers, key })
}

const SEPARATORS: [char; 3] = ['+', '-', ' '];

/// Splits off a final separator character that follows another separator.
fn split_trailing_key(body: &str) -> Option<(&str, &str)> {
    let last = body.chars().last().filter(|c| SEPARATORS.contains(c))?;
    let head = &body[..body.len() - last.len_utf8()];
    if !head.ends_with(SEPARATORS) {
        return None;
    }
    Some((head, &body[head.len()..]))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_synonyms() {
        let s = parse_shortcut("Command+Option+Esc").unwrap();
        assert_eq!(s.modifiers, vec![Modifier::Command, Modifier::Option]);
        assert_eq!(s.key, "escape");

        let s = parse_shortcut("ctl-shift-T").unwrap();
        assert_eq!(s.modifiers, vec![Modifier::Control, Modifier::Shift]);
        assert_eq!(s.key, "t");
    }

    #[test]
    fn test_enter_maps_to_return() {
        assert_eq!(parse_shortcut("Enter").unwrap().key, "return");
    }

    #[test]
    fn test_space_separated_and_space_key() {
        let s = parse_shortcut("cmd space").unwrap();
        assert_eq!(s.modifiers, vec![Modifier::Command]);
        assert_eq!(s.key, "space");
        assert!(parse_shortcut(" ").unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_plus_key() {
        assert_eq!(parse_shortcut("+").unwrap().key, "+");
    }

    #[test]
    fn test_lone_modifier_is_key() {
        let s = parse_shortcut("shift").unwrap();
        assert!(s.modifiers.is_empty());
        assert_eq!(s.key, "shift");
    }

    #[test]
    fn test_separator_characters_as_keys() {
        let s = parse_shortcut("ctrl+-").unwrap();
        assert_eq!(s.modifiers, vec![Modifier::Control]);
        assert_eq!(s.key, "-");

        let s = parse_shortcut("ctrl++").unwrap();
        assert_eq!(s.modifiers, vec![Modifier::Control]);
        assert_eq!(s.key, "+");

        let s = parse_shortcut("cmd+ ").unwrap();
        assert_eq!(s.modifiers, vec![Modifier::Command]);
        assert_eq!(s.key, "space");

        let s = parse_shortcut("ctrl + -").unwrap();
        assert_eq!(s.modifiers, vec![Modifier::Control]);
        assert_eq!(s.key, "-");
    }

    #[test]
    fn test_trailing_whitespace_ignored() {
        let s = parse_shortcut("ctrl+c ").unwrap();
        assert_eq!(s.modifiers, vec![Modifier::Control]);
        assert_eq!(s.key, "c");
        assert_eq!(parse_shortcut("shift ").unwrap().key, "shift");
    }

    #[test]
    fn test_errors() {
        assert!(parse_shortcut("cmd+ctrl").is_err());
        assert!(parse_shortcut("a+b").is_err());
        assert!(parse_shortcut("ctrl+").is_err());
        assert!(parse_shortcut("cmd+cmd").is_err());
        assert!(parse_shortcut("a+-").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            parse_shortcut("shift+cmd+z").unwrap().to_string(),
            "cmd+shift+z"
        );
    }
}
