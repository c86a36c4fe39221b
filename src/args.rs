use std::io::{self, Read};
use std::str::FromStr;

/// A type for clap argument parsing that supports reading the value from
/// stdin when it is "-" and allows escaping "-" with "\-". Piped input
/// loses one trailing line break; links never legitimately end in one.
#[derive(Debug, Clone)]
pub struct StringInput(pub String);

impl FromStr for StringInput {
    type Err = std::io::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "-" {
            // Read from stdin
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            let value = buffer.strip_suffix('\n').unwrap_or(&buffer);
            let value = value.strip_suffix('\r').unwrap_or(value);
            Ok(StringInput(value.to_string()))
        } else if s == r"\-" {
            // Escaped dash becomes literal dash
            Ok(StringInput("-".to_string()))
        } else {
            // Regular string
            Ok(StringInput(s.to_string()))
        }
    }
}

impl AsRef<str> for StringInput {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StringInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
