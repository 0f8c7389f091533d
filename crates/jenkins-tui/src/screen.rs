//! Tab identifiers for the main view.

use std::fmt;

/// The three tabs, navigable by number keys and `Tab`/`Shift+Tab`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TabId {
    #[default]
    Dashboard, // 1
    Views, // 2
    Builds, // 3
}

impl TabId {
    /// All tabs in tab-bar order.
    pub const ALL: [TabId; 3] = [Self::Dashboard, Self::Views, Self::Builds];

    /// Numeric key (1-3) for this tab.
    pub fn number(self) -> u8 {
        match self {
            Self::Dashboard => 1,
            Self::Views => 2,
            Self::Builds => 3,
        }
    }

    /// Tab from a numeric key. Returns None for out-of-range.
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::Dashboard),
            2 => Some(Self::Views),
            3 => Some(Self::Builds),
            _ => None,
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|&t| t == self).unwrap_or(0)
    }

    /// Next tab (wraps around).
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    /// Previous tab (wraps around).
    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Dashboard => "Dashboard",
            Self::Views => "Views",
            Self::Builds => "Builds",
        }
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycling_wraps() {
        assert_eq!(TabId::Dashboard.next(), TabId::Views);
        assert_eq!(TabId::Builds.next(), TabId::Dashboard);
        assert_eq!(TabId::Dashboard.prev(), TabId::Builds);
    }

    #[test]
    fn number_round_trip() {
        for tab in TabId::ALL {
            assert_eq!(TabId::from_number(tab.number()), Some(tab));
        }
        assert_eq!(TabId::from_number(0), None);
        assert_eq!(TabId::from_number(4), None);
    }
}
