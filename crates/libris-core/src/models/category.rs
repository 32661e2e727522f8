use serde::{Deserialize, Serialize};

/// Shelf category of a record. Persisted as its display name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    History,
    Fiction,
    Science,
    Biography,
    Art,
    Technology,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Self::History,
        Self::Fiction,
        Self::Science,
        Self::Biography,
        Self::Art,
        Self::Technology,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::History => "History",
            Self::Fiction => "Fiction",
            Self::Science => "Science",
            Self::Biography => "Biography",
            Self::Art => "Art",
            Self::Technology => "Technology",
            Self::Other => "Other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("Invalid category: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_display() {
        assert_eq!(Category::History.to_string(), "History");
        assert_eq!(Category::Technology.to_string(), "Technology");
        assert_eq!(Category::default().to_string(), "Other");
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("fiction".parse::<Category>().unwrap(), Category::Fiction);
        assert_eq!(" ART ".parse::<Category>().unwrap(), Category::Art);
        assert!("Poetry".parse::<Category>().is_err());
    }
}
