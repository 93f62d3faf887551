use crate::upload::error::{ErrorKind, Result};
use exn::ResultExt;
use std::collections::HashSet;
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

const TIMESTAMP: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day] [hour]-[minute]-[second]");

/// `report.pdf` uploaded at 2024-03-01 09:15:00 becomes
/// `report [2024-03-01 09-15-00].pdf`.
pub fn timestamped(name: &str, at: OffsetDateTime) -> Result<String> {
    let timestamp = at.format(TIMESTAMP).or_raise(|| ErrorKind::Timestamp)?;
    let (stem, extension) = split_extension(name);
    Ok(format!("{stem} [{timestamp}]{extension}"))
}

/// Titles already present under the upload's parent, plus every name handed
/// out so far in this upload.
#[derive(Debug, Default)]
pub struct UploadNames {
    taken: HashSet<String>,
}
impl UploadNames {
    pub fn new(existing: impl IntoIterator<Item = String>) -> Self {
        Self { taken: existing.into_iter().collect() }
    }

    /// A title for `name` that nothing else under the parent uses.
    ///
    /// Colliding names get a timestamp; if even that is taken (several
    /// identical names in one upload within the same second), a counter
    /// follows it.
    pub fn claim(&mut self, name: &str, at: OffsetDateTime) -> Result<String> {
        let title = if self.taken.contains(name) {
            let renamed = timestamped(name, at)?;
            let mut candidate = renamed.clone();
            let mut counter = 2;
            while self.taken.contains(&candidate) {
                candidate = counted(&renamed, counter);
                counter += 1;
            }
            candidate
        } else {
            name.to_string()
        };
        self.taken.insert(title.clone());
        Ok(title)
    }
}

fn counted(name: &str, counter: usize) -> String {
    let (stem, extension) = split_extension(name);
    format!("{stem} ({counter}){extension}")
}

/// Split `name` into its stem and its extension (with the leading dot, or
/// empty).
fn split_extension(name: &str) -> (&str, String) {
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|stem| stem.to_str()).unwrap_or(name);
    let extension = path.extension().and_then(|ext| ext.to_str()).map(|ext| format!(".{ext}")).unwrap_or_default();
    (stem, extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use time::macros::datetime;

    const AT: OffsetDateTime = datetime!(2024-03-01 09:15:07 UTC);

    #[rstest]
    #[case("report.pdf", "report [2024-03-01 09-15-07].pdf")]
    #[case("README", "README [2024-03-01 09-15-07]")]
    #[case("archive.tar.gz", "archive.tar [2024-03-01 09-15-07].gz")]
    #[case("My Drawing.DWG", "My Drawing [2024-03-01 09-15-07].DWG")]
    fn test_timestamped(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(timestamped(name, AT).unwrap(), expected);
    }

    #[test]
    fn test_new_names_kept() {
        let mut names = UploadNames::new(["other.pdf".to_string()]);
        assert_eq!(names.claim("report.pdf", AT).unwrap(), "report.pdf");
    }

    #[test]
    fn test_existing_title_renamed() {
        let mut names = UploadNames::new(["report.pdf".to_string()]);
        assert_eq!(names.claim("report.pdf", AT).unwrap(), "report [2024-03-01 09-15-07].pdf");
    }

    #[test]
    fn test_names_from_same_upload_count() {
        let mut names = UploadNames::default();
        let claimed: Vec<_> = (0..3).map(|_| names.claim("a.txt", AT).unwrap()).collect();
        assert_eq!(claimed, ["a.txt", "a [2024-03-01 09-15-07].txt", "a [2024-03-01 09-15-07] (2).txt"]);
    }
}
