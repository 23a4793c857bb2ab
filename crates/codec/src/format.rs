use execd_core::Error;
use serde_json::Value;

use crate::compression::Compression;
use crate::csv_codec;

/// Structured formats recognized by a path's suffix chain, per the format
/// table: everything not matched by a known structured suffix falls back
/// to `Raw`, which requires the payload to already be a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Jsonl,
    Yaml,
    Csv,
    Tsv,
    Raw,
}

impl FileFormat {
    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "json" => Some(FileFormat::Json),
            "jsonl" | "ndjson" => Some(FileFormat::Jsonl),
            "yaml" | "yml" => Some(FileFormat::Yaml),
            "csv" => Some(FileFormat::Csv),
            "tsv" => Some(FileFormat::Tsv),
            "txt" => Some(FileFormat::Raw),
            _ => None,
        }
    }
}

/// Splits a logical path into its recognized format and optional trailing
/// compression suffix.
///
/// A path may carry at most one compression suffix (`.gz` or `.bz2`); a
/// second one is rejected with `INVALID_FILE_FORMAT`, matching the
/// "two compression suffixes is an error" rule.
pub fn parse_path(path: &str) -> Result<(FileFormat, Option<Compression>), Error> {
    let mut segments: Vec<&str> = path.rsplit('.').collect();
    // rsplit yields segments in reverse order (last suffix first); path
    // itself (before the first dot) is the final element.
    if segments.len() <= 1 {
        return Ok((FileFormat::Raw, None));
    }

    let mut compression = None;
    if let Some(candidate) = Compression::from_suffix(segments[0]) {
        compression = Some(candidate);
        segments.remove(0);
        if let Some(second) = segments.first() {
            if Compression::from_suffix(second).is_some() {
                return Err(Error::invalid_file_format(
                    path,
                    "multiple compression suffixes are not allowed",
                ));
            }
        }
    }

    let format = segments
        .first()
        .and_then(|s| FileFormat::from_suffix(s))
        .unwrap_or(FileFormat::Raw);

    Ok((format, compression))
}

/// Encodes a request payload value into the bytes to be written for the
/// given format, before any compression is applied.
pub fn encode(format: FileFormat, value: &Value, path: &str) -> Result<Vec<u8>, Error> {
    match format {
        FileFormat::Json => serde_json::to_vec_pretty(value).map_err(Error::from),
        FileFormat::Jsonl => encode_jsonl(value, path),
        FileFormat::Yaml => {
            serde_yaml::to_string(value)
                .map(|s| s.into_bytes())
                .map_err(|e| Error::invalid_file_payload(path, e.to_string()))
        }
        FileFormat::Csv => csv_codec::encode(value, b',').map_err(|msg| {
            Error::invalid_file_payload(path, msg)
        }),
        FileFormat::Tsv => csv_codec::encode(value, b'\t').map_err(|msg| {
            Error::invalid_file_payload(path, msg)
        }),
        FileFormat::Raw => match value.as_str() {
            Some(s) => Ok(s.as_bytes().to_vec()),
            None => Err(Error::invalid_file_payload(
                path,
                "raw/unrecognized file format requires a string payload",
            )),
        },
    }
}

fn encode_jsonl(value: &Value, path: &str) -> Result<Vec<u8>, Error> {
    let items = value.as_array().ok_or_else(|| {
        Error::invalid_file_payload(path, "jsonl/ndjson payload must be a JSON array")
    })?;
    let mut out = Vec::new();
    for item in items {
        serde_json::to_writer(&mut out, item)?;
        out.push(b'\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_formats() {
        assert_eq!(
            parse_path("a.json").unwrap(),
            (FileFormat::Json, None)
        );
        assert_eq!(parse_path("a.ndjson").unwrap(), (FileFormat::Jsonl, None));
        assert_eq!(parse_path("a.yml").unwrap(), (FileFormat::Yaml, None));
        assert_eq!(parse_path("a.bin").unwrap(), (FileFormat::Raw, None));
        assert_eq!(parse_path("noext").unwrap(), (FileFormat::Raw, None));
    }

    #[test]
    fn parses_single_compression_suffix() {
        assert_eq!(
            parse_path("a.json.gz").unwrap(),
            (FileFormat::Json, Some(Compression::Gzip))
        );
        assert_eq!(
            parse_path("a.csv.bz2").unwrap(),
            (FileFormat::Csv, Some(Compression::Bzip2))
        );
    }

    #[test]
    fn rejects_double_compression_suffix() {
        assert!(parse_path("a.json.gz.bz2").is_err());
    }

    #[test]
    fn encodes_json_deterministically() {
        let value = serde_json::json!({"x": 1});
        let bytes = encode(FileFormat::Json, &value, "a.json").unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "{\n  \"x\": 1\n}");
    }
}
