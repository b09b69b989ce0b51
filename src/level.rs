//! Dashboard hierarchy levels
//!
//! Nodes sit at one of three ranks: branch (also called "local" in older
//! configs), regional, and global. The ordering is total, bottom to top.

use serde::{Deserialize, Serialize};

/// Rank in the dashboard hierarchy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Bottom of the hierarchy. "local" is accepted as a synonym on input.
    #[serde(alias = "local")]
    Branch,
    Regional,
    Global,
}

impl Level {
    /// The next level up, or `None` at the top.
    pub fn next_higher(self) -> Option<Level> {
        match self {
            Level::Branch => Some(Level::Regional),
            Level::Regional => Some(Level::Global),
            Level::Global => None,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Level::Branch => "branch",
            Level::Regional => "regional",
            Level::Global => "global",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_bottom_to_top() {
        assert!(Level::Branch < Level::Regional);
        assert!(Level::Regional < Level::Global);
    }

    #[test]
    fn next_higher_topology() {
        assert_eq!(Level::Branch.next_higher(), Some(Level::Regional));
        assert_eq!(Level::Regional.next_higher(), Some(Level::Global));
        assert_eq!(Level::Global.next_higher(), None);
    }

    #[test]
    fn local_is_an_alias_for_branch() {
        let level: Level = serde_json::from_str("\"local\"").unwrap();
        assert_eq!(level, Level::Branch);
        let level: Level = serde_json::from_str("\"branch\"").unwrap();
        assert_eq!(level, Level::Branch);
        // Output form is always "branch"
        assert_eq!(serde_json::to_string(&Level::Branch).unwrap(), "\"branch\"");
    }
}
