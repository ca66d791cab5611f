use crate::scanner::ScanScope;
use crate::store::{Dimension, StatusLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Where scan results are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Strategy {
    /// Flag columns on the catalog table
    Embedded,
    /// Separate table of records with a missing file
    Detached,
}

impl From<Strategy> for StatusLayout {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Embedded => StatusLayout::Embedded,
            Strategy::Detached => StatusLayout::Detached,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OnlyDimension {
    Large,
    Small,
}

impl From<OnlyDimension> for ScanScope {
    fn from(only: OnlyDimension) -> Self {
        match only {
            OnlyDimension::Large => ScanScope::Large,
            OnlyDimension::Small => ScanScope::Small,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ListDimension {
    Large,
    Small,
    All,
}

impl ListDimension {
    /// The single dimension to list, or `None` for records missing either.
    pub fn dimension(&self) -> Option<Dimension> {
        match self {
            Self::Large => Some(Dimension::Large),
            Self::Small => Some(Dimension::Small),
            Self::All => None,
        }
    }
}
