//! Dense vector tables and the plain-text vector format shared by GloVe and
//! word2vec dumps.
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use candle_core::{Device, Tensor};
use candle_nn::{Embedding, Module};
use tracing::{debug, info, warn};
use wordemb_core::error::{Error, Result};

/// Rows of a text vector file in file order.
///
/// Each line is a word followed by `dim` space-separated floats. A leading
/// `<count> <dim>` word2vec header is skipped. The trailing `dim` fields are
/// the vector, so words may contain spaces.
pub struct TextVectors {
    pub words: Vec<String>,
    pub data: Vec<f32>,
    pub dim: usize,
}

impl TextVectors {
    pub fn read(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::NotFound(format!("vector file {}", path.display())));
        }
        let mut reader = BufReader::new(File::open(path)?);
        let mut words = Vec::new();
        let mut data = Vec::new();
        let mut dim: Option<usize> = None;
        let mut buf = Vec::new();
        let mut line_no = 0usize;
        let mut first_entry = true;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 { break; }
            line_no += 1;
            let Ok(line) = std::str::from_utf8(&buf) else {
                warn!(line = line_no, "skipping entry that is not valid UTF-8");
                continue;
            };
            let fields: Vec<&str> = line.trim_end_matches(['\n', '\r']).split(' ').filter(|f| !f.is_empty()).collect();
            if fields.is_empty() { continue; }
            if std::mem::take(&mut first_entry) && is_header(&fields) {
                debug!(line = line_no, "skipping word2vec header");
                continue;
            }
            if fields.len() == 1 {
                return Err(Error::ModelLoad(format!("{}:{}: entry has no values", path.display(), line_no)));
            }
            let width = *dim.get_or_insert(fields.len() - 1);
            if fields.len() < width + 1 {
                return Err(Error::ModelLoad(format!(
                    "{}:{}: expected {} values, found {}",
                    path.display(), line_no, width, fields.len() - 1
                )));
            }
            let split = fields.len() - width;
            for field in &fields[split..] {
                let value = field.parse::<f32>().map_err(|_| {
                    Error::ModelLoad(format!("{}:{}: bad value '{}'", path.display(), line_no, field))
                })?;
                data.push(value);
            }
            words.push(fields[..split].join(" "));
        }

        let dim = dim.ok_or_else(|| Error::ModelLoad(format!("{} contains no vectors", path.display())))?;
        info!(path = %path.display(), rows = words.len(), dim, "loaded text vectors");
        Ok(Self { words, data, dim })
    }

    /// Word to row index. A word listed twice maps to its last row.
    pub fn index(&self) -> HashMap<String, u32> {
        self.words.iter().enumerate().map(|(i, w)| (w.clone(), i as u32)).collect()
    }

    pub fn rows(&self) -> usize { self.words.len() }

    pub fn into_table(self, device: &Device) -> Result<VectorTable> {
        let rows = self.words.len();
        VectorTable::new(self.data, rows, self.dim, device)
    }
}

/// The `<count> <dim>` line that opens a word2vec text dump.
fn is_header(fields: &[&str]) -> bool {
    fields.len() == 2 && fields.iter().all(|f| f.parse::<usize>().is_ok())
}

/// A `[rows, dim]` embedding matrix resident on one device.
pub struct VectorTable {
    embedding: Embedding,
    rows: usize,
    dim: usize,
}

impl VectorTable {
    pub fn new(data: Vec<f32>, rows: usize, dim: usize, device: &Device) -> Result<Self> {
        let weights = Tensor::from_vec(data, (rows, dim), device)?;
        Ok(Self { embedding: Embedding::new(weights, dim), rows, dim })
    }

    /// Row `id` as a `[dim]` tensor, or `None` past the end of the table.
    pub fn row(&self, id: u32) -> Result<Option<Tensor>> {
        if id as usize >= self.rows { return Ok(None); }
        let ids = Tensor::new(&[id], self.device())?;
        Ok(Some(self.embedding.forward(&ids)?.squeeze(0)?))
    }

    pub fn to_device(&mut self, device: &Device) -> Result<()> {
        let weights = self.embedding.embeddings().to_device(device)?;
        self.embedding = Embedding::new(weights, self.dim);
        Ok(())
    }

    pub fn device(&self) -> &Device { self.embedding.embeddings().device() }
    pub fn rows(&self) -> usize { self.rows }
    pub fn dim(&self) -> usize { self.dim }
}
