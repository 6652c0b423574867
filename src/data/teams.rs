//! NBA franchise directory
//!
//! Team identifiers are the full franchise names. Game logs and schedules
//! arrive with codes, nicknames or older spellings, so everything is
//! normalised here on ingest.

use crate::{HoopError, Result, TeamId};

/// An NBA franchise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Franchise {
    pub name: &'static str,
    /// basketball-reference team code
    pub code: &'static str,
    pub aliases: &'static [&'static str],
}

impl Franchise {
    pub fn id(&self) -> TeamId {
        TeamId::from(self.name)
    }

    pub fn matches_name(&self, name: &str) -> bool {
        let name_lower = name.trim().to_lowercase();
        self.name.to_lowercase() == name_lower
            || self.code.to_lowercase() == name_lower
            || self.aliases.iter().any(|a| a.to_lowercase() == name_lower)
    }
}

pub const FRANCHISES: &[Franchise] = &[
    Franchise { name: "Atlanta Hawks", code: "ATL", aliases: &["Hawks"] },
    Franchise { name: "Boston Celtics", code: "BOS", aliases: &["Celtics"] },
    Franchise { name: "Brooklyn Nets", code: "BRK", aliases: &["Nets", "BKN"] },
    Franchise { name: "Charlotte Hornets", code: "CHO", aliases: &["Hornets", "CHA"] },
    Franchise { name: "Chicago Bulls", code: "CHI", aliases: &["Bulls"] },
    Franchise { name: "Cleveland Cavaliers", code: "CLE", aliases: &["Cavaliers", "Cavs"] },
    Franchise { name: "Dallas Mavericks", code: "DAL", aliases: &["Mavericks", "Mavs"] },
    Franchise { name: "Denver Nuggets", code: "DEN", aliases: &["Nuggets"] },
    Franchise { name: "Detroit Pistons", code: "DET", aliases: &["Pistons"] },
    Franchise { name: "Golden State Warriors", code: "GSW", aliases: &["Warriors", "GS"] },
    Franchise { name: "Houston Rockets", code: "HOU", aliases: &["Rockets"] },
    Franchise { name: "Indiana Pacers", code: "IND", aliases: &["Pacers"] },
    Franchise { name: "Los Angeles Clippers", code: "LAC", aliases: &["Clippers", "LA Clippers"] },
    Franchise { name: "Los Angeles Lakers", code: "LAL", aliases: &["Lakers", "LA Lakers"] },
    Franchise { name: "Memphis Grizzlies", code: "MEM", aliases: &["Grizzlies"] },
    Franchise { name: "Miami Heat", code: "MIA", aliases: &["Heat"] },
    Franchise { name: "Milwaukee Bucks", code: "MIL", aliases: &["Bucks"] },
    Franchise { name: "Minnesota Timberwolves", code: "MIN", aliases: &["Timberwolves", "Wolves"] },
    Franchise { name: "New Orleans Pelicans", code: "NOP", aliases: &["Pelicans", "NO"] },
    Franchise { name: "New York Knicks", code: "NYK", aliases: &["Knicks", "NY"] },
    Franchise { name: "Oklahoma City Thunder", code: "OKC", aliases: &["Thunder"] },
    Franchise { name: "Orlando Magic", code: "ORL", aliases: &["Magic"] },
    Franchise { name: "Philadelphia 76ers", code: "PHI", aliases: &["76ers", "Sixers"] },
    Franchise { name: "Phoenix Suns", code: "PHO", aliases: &["Suns", "PHX"] },
    Franchise { name: "Portland Trail Blazers", code: "POR", aliases: &["Trail Blazers", "Blazers"] },
    Franchise { name: "Sacramento Kings", code: "SAC", aliases: &["Kings"] },
    Franchise { name: "San Antonio Spurs", code: "SAS", aliases: &["Spurs", "SA"] },
    Franchise { name: "Toronto Raptors", code: "TOR", aliases: &["Raptors"] },
    Franchise { name: "Utah Jazz", code: "UTA", aliases: &["Jazz", "UTAH"] },
    Franchise { name: "Washington Wizards", code: "WAS", aliases: &["Wizards", "WSH"] },
];

/// Look up a franchise by name, code or alias (case-insensitive)
pub fn find_team(name: &str) -> Option<&'static Franchise> {
    FRANCHISES.iter().find(|f| f.matches_name(name))
}

/// Canonical identifier for a team name
pub fn normalize(name: &str) -> Result<TeamId> {
    find_team(name)
        .map(Franchise::id)
        .ok_or_else(|| HoopError::UnknownTeam(name.trim().to_string()))
}

/// Canonical identifier when the team is known, otherwise the trimmed input
pub fn canonical(name: &str) -> TeamId {
    find_team(name)
        .map(Franchise::id)
        .unwrap_or_else(|| TeamId::from(name.trim()))
}
