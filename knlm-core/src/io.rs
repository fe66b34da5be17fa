use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::{fs, io};

use crate::error::Result;
use crate::model::language_model::ModelRecord;

/// Extension selecting the compact binary model encoding.
pub const BINARY_EXTENSION: &str = "bin";

/// Reads a corpus file, one sentence per line.
///
/// - Splits each line on whitespace
/// - Empty lines become empty sentences
pub fn read_corpus<P: AsRef<Path>>(filename: P) -> io::Result<Vec<Vec<String>>> {
	let reader = BufReader::new(File::open(filename)?);
	reader
		.lines()
		.map(|line| -> io::Result<Vec<String>> {
			Ok(line?.split_whitespace().map(str::to_owned).collect())
		})
		.collect()
}

/// Builds an output path based on an input path and a new extension.
///
/// Example:
/// `models/lm.json` + `"bin"` → `models/lm.bin`
pub fn build_output_path<P: AsRef<Path>>(
	input_path: P,
	output_extension: &str,
) -> io::Result<PathBuf> {
	let input_path = input_path.as_ref();

	let parent = input_path.parent().unwrap_or_else(|| Path::new("."));
	let file_stem = input_path
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Input path has no filename"))?;

	let mut output = PathBuf::from(parent);
	output.push(file_stem);
	output.set_extension(output_extension);

	Ok(output)
}

fn is_binary(path: &Path) -> bool {
	path.extension() == Some(std::ffi::OsStr::new(BINARY_EXTENSION))
}

/// Writes a model record, as postcard for `.bin` paths, pretty JSON otherwise.
pub(crate) fn write_record<P: AsRef<Path>>(path: P, record: &ModelRecord) -> Result<()> {
	let path = path.as_ref();
	if is_binary(path) {
		let bytes = postcard::to_stdvec(record)?;
		fs::write(path, bytes)?;
	} else {
		let mut writer = BufWriter::new(File::create(path)?);
		serde_json::to_writer_pretty(&mut writer, record)?;
		writeln!(writer)?;
		writer.flush()?;
	}
	Ok(())
}

/// Reads a model record written by `write_record`.
pub(crate) fn read_record<P: AsRef<Path>>(path: P) -> Result<ModelRecord> {
	let path = path.as_ref();
	if is_binary(path) {
		let bytes = fs::read(path)?;
		Ok(postcard::from_bytes(&bytes)?)
	} else {
		let reader = BufReader::new(File::open(path)?);
		Ok(serde_json::from_reader(reader)?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn output_path_swaps_extension() {
		let path = build_output_path("models/lm.json", "bin").unwrap();
		assert_eq!(path, PathBuf::from("models/lm.bin"));
	}

	#[test]
	fn corpus_lines_are_split_on_whitespace() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("train.txt");
		fs::write(&path, "a  b\tc\n\nd\n").unwrap();

		let corpus = read_corpus(&path).unwrap();
		assert_eq!(corpus, vec![vec!["a", "b", "c"], vec![], vec!["d"]]);
	}
}
