//! ASCII PLY reading and writing.
//!
//! Vertices carry `x y z` and optionally `intensity`. Other vertex properties
//! are skipped on read; a missing intensity reads as zero.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{RegistrationError, Result};
use crate::model::{Point, PointCloud};

/// Read a PLY file.
pub fn read_ply(path: impl AsRef<Path>) -> Result<PointCloud> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| RegistrationError::io(path, e))?;
    read_ply_from(BufReader::new(file), path)
}

/// Read PLY data from a reader. `path` only labels errors.
pub fn read_ply_from<R: BufRead>(reader: R, path: &Path) -> Result<PointCloud> {
    let mut lines = reader.lines();
    let mut next_line = |what: &str| -> Result<String> {
        match lines.next() {
            Some(line) => line.map_err(|e| RegistrationError::io(path, e)),
            None => Err(RegistrationError::parse(path, format!("unexpected end of file in {what}"))),
        }
    };

    if next_line("header")?.trim() != "ply" {
        return Err(RegistrationError::parse(path, "missing 'ply' magic"));
    }

    let mut format = String::new();
    let mut num_vertices = 0usize;
    let mut in_vertex = false;
    let mut properties: Vec<String> = Vec::new();
    loop {
        let line = next_line("header")?;
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("format") => format = tokens.next().unwrap_or_default().to_string(),
            Some("element") => {
                in_vertex = tokens.next() == Some("vertex");
                if in_vertex {
                    num_vertices = tokens
                        .next()
                        .and_then(|n| n.parse().ok())
                        .ok_or_else(|| RegistrationError::parse(path, "invalid vertex count"))?;
                }
            }
            Some("property") if in_vertex => {
                if let Some(name) = tokens.last() {
                    properties.push(name.to_string());
                }
            }
            Some("end_header") => break,
            _ => {}
        }
    }

    if format != "ascii" {
        return Err(RegistrationError::parse(
            path,
            format!("PLY format '{format}' not supported, only ascii"),
        ));
    }
    let column = |name: &str| properties.iter().position(|p| p == name);
    let (Some(ix), Some(iy), Some(iz)) = (column("x"), column("y"), column("z")) else {
        return Err(RegistrationError::parse(path, "vertex element lacks x, y or z"));
    };
    let intensity = column("intensity");

    let mut points = Vec::with_capacity(num_vertices);
    for _ in 0..num_vertices {
        let line = next_line("vertex data")?;
        let values = line
            .split_whitespace()
            .map(|s| {
                s.parse::<f32>()
                    .map_err(|_| RegistrationError::parse(path, format!("invalid number '{s}'")))
            })
            .collect::<Result<Vec<f32>>>()?;
        if values.len() < properties.len() {
            return Err(RegistrationError::parse(path, "not enough values for vertex"));
        }
        points.push(Point::new(
            values[ix],
            values[iy],
            values[iz],
            intensity.map(|i| values[i]).unwrap_or(0.0),
        ));
    }

    debug!("Read {} points from {}", points.len(), path.display());
    Ok(PointCloud::new(points))
}

/// Write a cloud as ASCII PLY with intensity.
pub fn write_ply(path: impl AsRef<Path>, cloud: &PointCloud) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| RegistrationError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    write_ply_to(&mut writer, cloud)
        .and_then(|_| writer.flush())
        .map_err(|e| RegistrationError::io(path, e))
}

pub fn write_ply_to<W: Write>(writer: &mut W, cloud: &PointCloud) -> std::io::Result<()> {
    writeln!(writer, "ply")?;
    writeln!(writer, "format ascii 1.0")?;
    writeln!(writer, "element vertex {}", cloud.len())?;
    writeln!(writer, "property float x")?;
    writeln!(writer, "property float y")?;
    writeln!(writer, "property float z")?;
    writeln!(writer, "property float intensity")?;
    writeln!(writer, "end_header")?;
    for p in cloud.iter() {
        writeln!(
            writer,
            "{} {} {} {}",
            p.position.x, p.position.y, p.position.z, p.intensity
        )?;
    }
    Ok(())
}

/// Writes clouds as `<directory>/<prefix><n>.ply`, numbering each file after
/// the number of entries already in the directory.
#[derive(Debug, Clone)]
pub struct PlyWriter {
    directory: PathBuf,
    prefix: String,
}

impl PlyWriter {
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Write `cloud` to the next free number and return its path.
    pub fn write_next(&self, cloud: &PointCloud) -> Result<PathBuf> {
        fs::create_dir_all(&self.directory).map_err(|e| RegistrationError::io(&self.directory, e))?;
        let count = fs::read_dir(&self.directory)
            .map_err(|e| RegistrationError::io(&self.directory, e))?
            .count();
        let path = self.directory.join(format!("{}{}.ply", self.prefix, count + 1));
        write_ply(&path, cloud)?;
        debug!("Wrote {} points to {}", cloud.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAMPLE: &str = "ply
format ascii 1.0
comment scanner export
element vertex 2
property float x
property float y
property float z
property uchar red
property float intensity
element face 0
property list uchar int vertex_indices
end_header
1.0 2.0 3.0 255 7.5
-1 0.5 0 0 1
";

    #[test]
    fn test_read_with_extra_properties() {
        let cloud = read_ply_from(Cursor::new(SAMPLE), Path::new("sample.ply")).unwrap();
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.points()[0], Point::new(1.0, 2.0, 3.0, 7.5));
        assert_eq!(cloud.points()[1], Point::new(-1.0, 0.5, 0.0, 1.0));
    }

    #[test]
    fn test_missing_intensity_reads_zero() {
        let data = "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nproperty float y\nproperty float z\nend_header\n4 5 6\n";
        let cloud = read_ply_from(Cursor::new(data), Path::new("xyz.ply")).unwrap();
        assert_eq!(cloud.points()[0], Point::new(4.0, 5.0, 6.0, 0.0));
    }

    #[test]
    fn test_rejects_bad_input() {
        let binary = SAMPLE.replace("ascii", "binary_little_endian");
        assert!(matches!(
            read_ply_from(Cursor::new(binary), Path::new("b.ply")),
            Err(RegistrationError::Parse { .. })
        ));
        let truncated = SAMPLE.replace("-1 0.5 0 0 1\n", "");
        assert!(read_ply_from(Cursor::new(truncated), Path::new("t.ply")).is_err());
        let garbage = SAMPLE.replace("7.5", "seven");
        assert!(read_ply_from(Cursor::new(garbage), Path::new("g.ply")).is_err());
        assert!(read_ply_from(Cursor::new("obj\n"), Path::new("o.ply")).is_err());
    }

    #[test]
    fn test_file_round_trip_and_numbering() {
        let dir = tempfile::tempdir().unwrap();
        let cloud = PointCloud::new(vec![
            Point::new(0.25, -1.5, 2.0, 3.0),
            Point::new(4.0, 5.0, 6.0, 0.5),
        ]);

        let writer = PlyWriter::new(dir.path().join("out"), "cloud_");
        let first = writer.write_next(&cloud).unwrap();
        let second = writer.write_next(&cloud).unwrap();
        assert_eq!(first.file_name().unwrap(), "cloud_1.ply");
        assert_eq!(second.file_name().unwrap(), "cloud_2.ply");

        let back = read_ply(&second).unwrap();
        assert_eq!(back.points(), cloud.points());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            read_ply("/nonexistent/dir/cloud.ply"),
            Err(RegistrationError::Io { .. })
        ));
    }
}
