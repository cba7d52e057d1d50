use std::fmt;

/// A source location specifier, `file[:line[:col]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line_num: Option<u64>,
    pub column_num: Option<u64>,
}

impl Location {
    /// Parse a `file[:line[:col]]` specifier. The two trailing components
    /// must be numbers; everything before them is the file name.
    pub fn parse(spec: &str) -> Result<Location, String> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err("empty breakpoint specifier".to_string());
        }

        let mut parts = spec.rsplitn(3, ':');
        let last = parts.next().expect("rsplitn yields at least one part");
        let middle = parts.next();
        let head = parts.next();

        // `file`, `file:line` or `file:line:col`; a non-numeric tail means
        // the colon belongs to the file name itself.
        let (file, line_num, column_num) = match (head, middle, last.parse::<u64>().ok()) {
            (Some(file), Some(middle), Some(column)) => match middle.parse::<u64>() {
                Ok(line) => (file.to_string(), Some(line), Some(column)),
                Err(_) => return Err(format!("invalid line number `{middle}`")),
            },
            (None, Some(file), Some(line)) => (file.to_string(), Some(line), None),
            (_, _, None) if middle.is_none() => (spec.to_string(), None, None),
            _ => return Err(format!("invalid location `{spec}`")),
        };

        if file.is_empty() {
            return Err(format!("invalid location `{spec}`"));
        }
        Ok(Location {
            file,
            line_num,
            column_num,
        })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file)?;
        if let Some(line) = self.line_num {
            write!(f, ":{line}")?;
        }
        if let Some(column) = self.column_num {
            write!(f, ":{column}")?;
        }
        Ok(())
    }
}

/// Breakpoint subcommand.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Add(Location),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_forms() {
        assert_eq!(
            Location::parse("test.py").unwrap(),
            Location {
                file: "test.py".to_string(),
                line_num: None,
                column_num: None
            }
        );
        assert_eq!(
            Location::parse("test.py:5").unwrap(),
            Location {
                file: "test.py".to_string(),
                line_num: Some(5),
                column_num: None
            }
        );
        assert_eq!(
            Location::parse("/tmp/test.py:5:12").unwrap(),
            Location {
                file: "/tmp/test.py".to_string(),
                line_num: Some(5),
                column_num: Some(12)
            }
        );
    }

    #[test]
    fn test_bad_locations() {
        assert!(Location::parse("").is_err());
        assert!(Location::parse("file:x:1").is_err());
        assert!(Location::parse(":5:1").is_err());
    }
}
