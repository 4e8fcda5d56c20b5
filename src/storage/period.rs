use crate::error::StorageError;
use crate::events::Timestamp;
use chrono::Datelike;
use std::fmt;
use std::str::FromStr;

const FILE_PREFIX: &str = "temp_log_";
const FILE_EXTENSION: &str = ".csv";

/// Calendar month identifying one monthly log file (`YYYY-MM`)
///
/// Ordering is chronological, so "strictly earlier period" is plain `<`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodKey {
    year: i32,
    month: u32,
}

impl PeriodKey {
    /// Create a period key, rejecting months outside 1..=12
    pub fn new(year: i32, month: u32) -> Result<Self, StorageError> {
        if !(1..=12).contains(&month) || !(0..=9999).contains(&year) {
            return Err(StorageError::InvalidPeriod(format!("{year}-{month}")));
        }
        Ok(Self { year, month })
    }

    /// The period a local timestamp falls in
    pub fn from_timestamp(timestamp: &Timestamp) -> Self {
        Self {
            year: timestamp.year(),
            month: timestamp.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The calendar month immediately before this one
    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Name of the log file holding this period's readings
    pub fn file_name(&self) -> String {
        format!("{FILE_PREFIX}{self}{FILE_EXTENSION}")
    }

    /// Recover the period from a log file name, `None` for unrelated files
    pub fn from_file_name(name: &str) -> Option<Self> {
        name.strip_prefix(FILE_PREFIX)?
            .strip_suffix(FILE_EXTENSION)?
            .parse()
            .ok()
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for PeriodKey {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StorageError::InvalidPeriod(s.to_string());

        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;

        Self::new(year, month).map_err(|_| invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_period_from_timestamp() {
        let ts = NaiveDate::from_ymd_opt(2024, 7, 31)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        let period = PeriodKey::from_timestamp(&ts);
        assert_eq!(period.to_string(), "2024-07");
    }

    #[test]
    fn test_previous_wraps_year() {
        let january = PeriodKey::new(2025, 1).unwrap();
        assert_eq!(january.previous(), PeriodKey::new(2024, 12).unwrap());

        let june = PeriodKey::new(2025, 6).unwrap();
        assert_eq!(june.previous(), PeriodKey::new(2025, 5).unwrap());
    }

    #[test]
    fn test_chronological_ordering() {
        let dec = PeriodKey::new(2024, 12).unwrap();
        let jan = PeriodKey::new(2025, 1).unwrap();
        let feb = PeriodKey::new(2025, 2).unwrap();

        assert!(dec < jan);
        assert!(jan < feb);
    }

    #[test]
    fn test_parse_rejects_malformed_keys() {
        assert!("2024-13".parse::<PeriodKey>().is_err());
        assert!("2024-00".parse::<PeriodKey>().is_err());
        assert!("2024-1".parse::<PeriodKey>().is_err());
        assert!("24-01".parse::<PeriodKey>().is_err());
        assert!("2024/01".parse::<PeriodKey>().is_err());
        assert!("".parse::<PeriodKey>().is_err());
        assert_eq!(
            "2024-03".parse::<PeriodKey>().unwrap(),
            PeriodKey::new(2024, 3).unwrap()
        );
    }

    #[test]
    fn test_file_name_mapping() {
        let period = PeriodKey::new(2024, 3).unwrap();
        assert_eq!(period.file_name(), "temp_log_2024-03.csv");
        assert_eq!(
            PeriodKey::from_file_name("temp_log_2024-03.csv"),
            Some(period)
        );
        assert_eq!(PeriodKey::from_file_name("temp_log_2024-03.xlsx"), None);
        assert_eq!(PeriodKey::from_file_name("notes.txt"), None);
        assert_eq!(PeriodKey::from_file_name("temp_log_garbage.csv"), None);
    }
}
