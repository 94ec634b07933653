use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;

use super::error::{AssignmentError, Result};


// A convenience type for parsing csv data
pub type Row = HashMap<String, String>;

pub fn str_to_absolute_path(path_str: &str, default_base_dir: &Path) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        return path;
    } else {
        return [default_base_dir, Path::new(&path)].iter().collect();
    }
}

/// Substitutes the `{day}` and `{hour}` placeholders of a per-hour path template.
pub fn fill_day_hour(template: &str, day: u32, hour: u32) -> String {
    template.replace("{day}", &day.to_string()).replace("{hour}", &hour.to_string())
}

/// Reads every row of a headed csv file into column-name -> value maps.
pub fn read_rows(csvpath: &Path) -> Result<Vec<Row>> {
    let file = File::open(csvpath).map_err(|err| AssignmentError::io(csvpath, err))?;
    let mut reader = csv::Reader::from_reader(file);
    let mut rows = vec![];
    for result in reader.deserialize() {
        let row: Row = result.map_err(|err| AssignmentError::csv(csvpath, err))?;
        rows.push(row);
    }
    Ok(rows)
}

pub fn parse_field<T: FromStr>(row: &Row, column: &str, csvpath: &Path) -> Result<T> {
    let raw = row.get(column).ok_or_else(|| {
        AssignmentError::input_format(csvpath, format!("missing column '{}'", column))
    })?;
    raw.trim().parse().map_err(|_| {
        AssignmentError::input_format(csvpath,
                                      format!("can't parse '{}' in column '{}'", raw, column))
    })
}

pub fn create_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| AssignmentError::io(parent, err))?;
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_fill_day_hour() {
        assert_eq!(fill_day_hour("od/DY{day}/OD_DY{day}_HR{hour}.csv", 2, 17),
                   "od/DY2/OD_DY2_HR17.csv");
        assert_eq!(fill_day_hour("static.csv", 0, 3), "static.csv");
    }

    #[test]
    fn test_str_to_absolute_path() {
        let base = Path::new("/data/run");
        assert_eq!(str_to_absolute_path("edges.csv", base), PathBuf::from("/data/run/edges.csv"));
        assert_eq!(str_to_absolute_path("/tmp/edges.csv", base), PathBuf::from("/tmp/edges.csv"));
    }

    #[test]
    fn test_read_and_parse_rows() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "a,b").unwrap();
        writeln!(file, "1, 2.5").unwrap();
        writeln!(file, "x,3").unwrap();

        let rows = read_rows(&path)?;
        assert_eq!(rows.len(), 2);
        let aa: i64 = parse_field(&rows[0], "a", &path)?;
        let bb: f64 = parse_field(&rows[0], "b", &path)?;
        assert_eq!(aa, 1);
        assert_eq!(bb, 2.5);

        let bad: Result<i64> = parse_field(&rows[1], "a", &path);
        assert!(matches!(bad, Err(AssignmentError::InputFormat { .. })));
        let missing: Result<i64> = parse_field(&rows[1], "c", &path);
        match missing {
            Err(AssignmentError::InputFormat { path: bad_path, msg }) => {
                assert_eq!(bad_path, path);
                assert!(msg.contains("'c'"));
            }
            other => panic!("expected an input format error, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_read_rows_missing_file() {
        let result = read_rows(Path::new("/nonexistent/rows.csv"));
        assert!(matches!(result, Err(AssignmentError::Io { .. })));
    }
}
