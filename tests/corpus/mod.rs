//! In-memory zip archives for testing, plus helpers to run them through
//! the state machine.

#![allow(dead_code)]

use std::io::Write;

use zip_chunked::{Error, StreamFsm, StreamItem};

pub const METHOD_STORE: u16 = 0;
pub const METHOD_DEFLATE: u16 = 8;
pub const METHOD_BZIP2: u16 = 12;
pub const METHOD_ZSTD: u16 = 93;

pub struct TestEntry {
    pub name: Vec<u8>,
    pub data: Vec<u8>,
    pub method: u16,
    pub flags: u16,
    pub extra: Vec<u8>,
    /// overrides the CRC-32 written in the local header
    pub crc32: Option<u32>,
}

impl TestEntry {
    pub fn stored(name: &str, data: &[u8]) -> Self {
        Self {
            name: name.as_bytes().to_vec(),
            data: data.to_vec(),
            method: METHOD_STORE,
            flags: 0,
            extra: vec![],
            crc32: None,
        }
    }

    pub fn deflated(name: &str, data: &[u8]) -> Self {
        Self::with_method(name, data, METHOD_DEFLATE)
    }

    pub fn with_method(name: &str, data: &[u8], method: u16) -> Self {
        Self {
            method,
            ..Self::stored(name, data)
        }
    }

    pub fn compressed(&self) -> Vec<u8> {
        match self.method {
            METHOD_DEFLATE => miniz_oxide::deflate::compress_to_vec(&self.data, 6),
            METHOD_BZIP2 => {
                let mut enc =
                    bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
                enc.write_all(&self.data).unwrap();
                enc.finish().unwrap()
            }
            METHOD_ZSTD => zstd::encode_all(&self.data[..], 3).unwrap(),
            _ => self.data.clone(),
        }
    }
}

#[derive(Default)]
pub struct ArchiveBuilder {
    out: Vec<u8>,
    directory: Vec<u8>,
    num_entries: u16,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(self, entry: TestEntry) -> Self {
        let compressed = entry.compressed();
        self.entry_with_payload(entry, compressed)
    }

    /// Like [Self::entry], with the compressed bytes given as-is
    pub fn entry_with_payload(mut self, entry: TestEntry, compressed: Vec<u8>) -> Self {
        let offset = self.out.len() as u32;
        let crc32 = entry
            .crc32
            .unwrap_or_else(|| crc32fast::hash(&entry.data));

        // 4.3.7 local file header
        let out = &mut self.out;
        out.extend_from_slice(b"PK\x03\x04");
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&entry.flags.to_le_bytes());
        out.extend_from_slice(&entry.method.to_le_bytes());
        out.extend_from_slice(&0x6b5du16.to_le_bytes());
        out.extend_from_slice(&0x4ef5u16.to_le_bytes());
        out.extend_from_slice(&crc32.to_le_bytes());
        out.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        out.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
        out.extend_from_slice(&(entry.extra.len() as u16).to_le_bytes());
        out.extend_from_slice(&entry.name);
        out.extend_from_slice(&entry.extra);
        out.extend_from_slice(&compressed);

        // 4.3.12 central directory header
        let dir = &mut self.directory;
        dir.extend_from_slice(b"PK\x01\x02");
        dir.extend_from_slice(&0x031eu16.to_le_bytes());
        dir.extend_from_slice(&20u16.to_le_bytes());
        dir.extend_from_slice(&entry.flags.to_le_bytes());
        dir.extend_from_slice(&entry.method.to_le_bytes());
        dir.extend_from_slice(&0x6b5du16.to_le_bytes());
        dir.extend_from_slice(&0x4ef5u16.to_le_bytes());
        dir.extend_from_slice(&crc32.to_le_bytes());
        dir.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        dir.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
        dir.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
        dir.extend_from_slice(&0u16.to_le_bytes());
        dir.extend_from_slice(&0u16.to_le_bytes());
        dir.extend_from_slice(&0u16.to_le_bytes());
        dir.extend_from_slice(&0u16.to_le_bytes());
        dir.extend_from_slice(&0u32.to_le_bytes());
        dir.extend_from_slice(&offset.to_le_bytes());
        dir.extend_from_slice(&entry.name);

        self.num_entries += 1;
        self
    }

    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        self.entry(TestEntry::stored(name, data))
    }

    pub fn deflated(self, name: &str, data: &[u8]) -> Self {
        self.entry(TestEntry::deflated(name, data))
    }

    /// Raw bytes between records, like some writers insert
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.out.extend_from_slice(bytes);
        self
    }

    /// Local headers and data only
    pub fn without_directory(self) -> Vec<u8> {
        self.out
    }

    /// A complete archive: entries, central directory, end of central directory
    pub fn build(self) -> Vec<u8> {
        let mut out = self.out;
        let directory_offset = out.len() as u32;
        out.extend_from_slice(&self.directory);

        // 4.3.16 end of central directory record
        out.extend_from_slice(b"PK\x05\x06");
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&self.num_entries.to_le_bytes());
        out.extend_from_slice(&self.num_entries.to_le_bytes());
        out.extend_from_slice(&(self.directory.len() as u32).to_le_bytes());
        out.extend_from_slice(&directory_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out
    }
}

/// Feed `chunks` to a fresh state machine, then finish it.
///
/// On error, also returns the items produced before it.
pub fn run_chunks<'a>(
    chunks: impl IntoIterator<Item = &'a [u8]>,
) -> Result<Vec<StreamItem>, (Vec<StreamItem>, Error)> {
    let mut fsm = StreamFsm::new();
    let mut out = Vec::new();
    for chunk in chunks {
        if let Err(e) = fsm.process(chunk, &mut out) {
            return Err((out, e));
        }
    }
    match fsm.finish() {
        Ok(()) => Ok(out),
        Err(e) => Err((out, e)),
    }
}

pub fn run(bytes: &[u8], chunk_size: usize) -> Result<Vec<StreamItem>, (Vec<StreamItem>, Error)> {
    run_chunks(bytes.chunks(chunk_size))
}

/// Merge consecutive data items, so that outputs of differently-chunked
/// runs can be compared.
pub fn normalize(items: Vec<StreamItem>) -> Vec<StreamItem> {
    let mut res: Vec<StreamItem> = Vec::new();
    for item in items {
        match (res.last_mut(), item) {
            (Some(StreamItem::Data(prev)), StreamItem::Data(next)) => prev.extend_from_slice(&next),
            (_, item) => res.push(item),
        }
    }
    res
}

/// (name, contents) for every complete entry
pub fn files(items: &[StreamItem]) -> Vec<(String, Vec<u8>)> {
    let mut res = Vec::new();
    let mut current: Option<(String, Vec<u8>)> = None;
    for item in items {
        match item {
            StreamItem::Header(header) => {
                assert!(current.is_none(), "header before end of previous entry");
                current = Some((header.decode_name().unwrap(), Vec::new()));
            }
            StreamItem::Data(data) => {
                assert!(!data.is_empty(), "data items are never empty");
                current
                    .as_mut()
                    .expect("data outside of an entry")
                    .1
                    .extend_from_slice(data);
            }
            StreamItem::EntryEnd => {
                res.push(current.take().expect("entry end outside of an entry"));
            }
        }
    }
    assert!(current.is_none(), "unfinished entry");
    res
}

/// Deterministic pseudo-random chunk sizes in 1..=max, from a tiny LCG
pub fn random_chunks(bytes: &[u8], seed: u64, max: usize) -> Vec<&[u8]> {
    let mut state = seed;
    let mut chunks = Vec::new();
    let mut rest = bytes;
    while !rest.is_empty() {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let len = ((state >> 33) as usize % max + 1).min(rest.len());
        let (head, tail) = rest.split_at(len);
        chunks.push(head);
        rest = tail;
    }
    chunks
}

pub fn sample_text(len: usize) -> Vec<u8> {
    let words = ["zip ", "chunk ", "stream ", "header ", "crc ", "deflate\n"];
    words.iter().cycle().flat_map(|w| w.bytes()).take(len).collect()
}

/// Log to the test writer, filtered by `RUST_LOG`.
pub fn install_test_subscriber() {
    let env_filter = tracing_subscriber::EnvFilter::builder().from_env_lossy();
    let sub = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_test_writer()
        .finish();
    // fails when called more than once per process, which `cargo test` does
    let _ = tracing::subscriber::set_global_default(sub);
}
