use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable participant key. Lookups go through this type rather than raw display strings.
/// Deserialized names are trimmed exactly like constructed ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PlayerId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<PlayerId> for String {
    fn from(value: PlayerId) -> Self {
        value.0
    }
}

/// Sorted, deduplicated set of tournament participants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PlayerId>", into = "Vec<PlayerId>")]
pub struct Roster {
    players: Vec<PlayerId>,
}

impl Roster {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .map(PlayerId::new)
            .collect::<Vec<_>>()
            .into()
    }

    pub fn players(&self) -> &[PlayerId] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.players.binary_search(id).is_ok()
    }

    /// Position of `id` in roster order, if present.
    pub fn index_of(&self, id: &PlayerId) -> Option<usize> {
        self.players.binary_search(id).ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerId> {
        self.players.iter()
    }
}

impl From<Vec<PlayerId>> for Roster {
    fn from(mut players: Vec<PlayerId>) -> Self {
        players.retain(|p| !p.as_str().is_empty());
        players.sort();
        players.dedup();
        Self { players }
    }
}

impl From<Roster> for Vec<PlayerId> {
    fn from(roster: Roster) -> Self {
        roster.players
    }
}

/// "John Smith" -> "John S." for market titles.
pub fn short_name(full: &str) -> String {
    let parts: Vec<&str> = full.split_whitespace().collect();
    if parts.len() <= 1 {
        return full.to_string();
    }
    let last_initial = parts[parts.len() - 1].chars().next().unwrap_or_default();
    format!("{} {}.", parts[0], last_initial)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_is_sorted_and_deduplicated() {
        let roster = Roster::from_names(["Yusuf Cura", "Ali Celik", "Ece Saritepe", "Ali Celik"]);
        let names: Vec<&str> = roster.iter().map(|p| p.as_str()).collect();
        assert_eq!(names, vec!["Ali Celik", "Ece Saritepe", "Yusuf Cura"]);
        assert_eq!(roster.index_of(&PlayerId::from("Ece Saritepe")), Some(1));
        assert!(!roster.contains(&PlayerId::from("Nobody")));
    }

    #[test]
    fn short_name_abbreviates_surname() {
        assert_eq!(short_name("Ata Kemal Yukselen"), "Ata Y.");
        assert_eq!(short_name("Baran Yildiz"), "Baran Y.");
        assert_eq!(short_name("Madonna"), "Madonna");
    }

    #[test]
    fn player_id_trims_whitespace() {
        assert_eq!(PlayerId::new("  Okan Duman "), PlayerId::from("Okan Duman"));
    }

    #[test]
    fn deserialized_ids_are_trimmed_too() {
        let id: PlayerId = serde_json::from_str(r#""  Okan Duman ""#).unwrap();
        assert_eq!(id, PlayerId::from("Okan Duman"));
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""Okan Duman""#);

        let roster: Roster = serde_json::from_str(r#"["Ali Celik ", "Ali Celik"]"#).unwrap();
        assert_eq!(roster.len(), 1);
    }
}
