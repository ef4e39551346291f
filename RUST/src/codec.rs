use crate::dataset::{Backing, Dataset, FieldStore, GridId, GridMeta, GridRecord, SpatialIndex};
use crate::error::{BrowseError, Result};
use crate::header::{
    compute_crc32, compute_header_crc32_hex, validate_header_crc, GridEntry, Header, MAGIC_BYTES,
    VERSION,
};
use crate::slice::{padded_dims, Field};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMode {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub compression: bool,
    pub compression_mode: CompressionMode,
    /// 0..=9
    pub compression_level: u32,
    pub crc: bool,
    pub pretty_header: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compression: true,
            compression_mode: CompressionMode::Auto,
            compression_level: 1,
            crc: true,
            pretty_header: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub validate: bool,
}

const COMPRESS_THRESHOLD_BYTES: usize = 1024;
const AUTO_ENTROPY_SAMPLE_BYTES: usize = 4096;
const AUTO_ENTROPY_MAX_UNIQUE_RATIO: f64 = 0.95;

// Hardening caps. These are not format limits; they prevent accidental/hostile OOM.
const MAX_HEADER_LEN: u32 = 64 * 1024 * 1024; // 64 MiB
const MAX_CHUNK_USIZE: u64 = 4u64 * 1024 * 1024 * 1024; // 4 GiB
const MAX_CHUNK_CSIZE: u64 = 4u64 * 1024 * 1024 * 1024; // 4 GiB

const BYTES_PER_SAMPLE: usize = 8;

fn checked_add_u64(a: u64, b: u64) -> Result<u64> {
    a.checked_add(b)
        .ok_or_else(|| BrowseError::Format("u64 addition overflow".to_string()))
}

fn u64_to_usize(v: u64, what: &str) -> Result<usize> {
    usize::try_from(v).map_err(|_| BrowseError::Unsupported(format!("{} too large for this platform", what)))
}

fn normalize_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let p = path.as_ref();
    if p.extension().is_some() {
        return p.to_path_buf();
    }
    let mut out = p.to_path_buf();
    out.set_extension("amrt");
    out
}

fn read_u32_le<R: Read>(r: &mut R) -> Result<u32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(u32::from_le_bytes(b))
}

fn write_u32_le<W: Write>(w: &mut W, v: u32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Read and parse the container header (and return the raw header JSON)
/// without decoding any grid payload.
pub fn read_header_only<P: AsRef<Path>>(path: P, opts: ReadOptions) -> Result<(Header, u32, String)> {
    let path = normalize_path(path);
    let mut file = File::open(&path)?;
    read_header_and_json(&mut file, &opts)
}

fn should_try_compress(raw: &[u8]) -> bool {
    if raw.len() < COMPRESS_THRESHOLD_BYTES {
        return false;
    }

    let sample_len = raw.len().min(AUTO_ENTROPY_SAMPLE_BYTES);
    let mut seen = [false; 256];
    let mut unique = 0usize;
    for &b in &raw[..sample_len] {
        let idx = b as usize;
        if !seen[idx] {
            seen[idx] = true;
            unique += 1;
        }
    }
    let ratio = unique as f64 / sample_len as f64;
    ratio <= AUTO_ENTROPY_MAX_UNIQUE_RATIO
}

fn zlib_compress(raw: &[u8], level: u32) -> Result<Vec<u8>> {
    let level = level.min(9);
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::new(level));
    enc.write_all(raw)?;
    let out = enc.finish()?;
    Ok(out)
}

fn zlib_decompress(comp: &[u8], max_out: u64) -> Result<Vec<u8>> {
    let max_out = max_out.min(MAX_CHUNK_USIZE);
    let dec = ZlibDecoder::new(comp);
    let mut out = Vec::new();

    // Read at most max_out + 1 bytes to detect overflow.
    let mut limited = dec.take(max_out.saturating_add(1));
    limited.read_to_end(&mut out)?;
    if out.len() as u64 > max_out {
        return Err(BrowseError::Format("decompressed data exceeds configured limit".to_string()));
    }
    Ok(out)
}

fn now_utc_string() -> String {
    let fmt = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");
    OffsetDateTime::now_utc().format(&fmt).unwrap_or_default()
}

fn read_header_and_json(file: &mut File, opts: &ReadOptions) -> Result<(Header, u32, String)> {
    let mut r = BufReader::new(&mut *file);

    let mut magic = [0u8; 8];
    r.read_exact(&mut magic)?;
    if magic != MAGIC_BYTES {
        return Err(BrowseError::Format("bad magic; not an AMRTREE container".to_string()));
    }

    let header_len = read_u32_le(&mut r)?;
    if header_len < 2 || header_len > MAX_HEADER_LEN {
        return Err(BrowseError::Format("invalid header_len".to_string()));
    }

    let mut header_bytes = vec![0u8; header_len as usize];
    r.read_exact(&mut header_bytes)?;

    let header_json = String::from_utf8(header_bytes)?;
    let header: Header = serde_json::from_str(&header_json)?;

    if header.version > VERSION {
        return Err(BrowseError::Unsupported(format!(
            "container version {} (this build reads up to {})",
            header.version, VERSION
        )));
    }

    let payload_start = 8u64 + 4u64 + header_len as u64;

    if opts.validate {
        validate_header_crc(&header, &header_json)?;

        if header.file_size > 0 {
            let fs = r.get_ref().metadata()?.len();
            if fs != header.file_size {
                return Err(BrowseError::FileSizeMismatch {
                    expected: header.file_size,
                    got: fs,
                });
            }
        }

        if header.payload_start > 0 && header.payload_start != payload_start {
            return Err(BrowseError::Format(format!(
                "payload_start mismatch: header={}, computed={}",
                header.payload_start, payload_start
            )));
        }
    }

    Ok((header, header_len, header_json))
}

fn grid_payload_start(header_len: u32, header_payload_start: u64) -> u64 {
    if header_payload_start > 0 {
        header_payload_start
    } else {
        8u64 + 4u64 + header_len as u64
    }
}

fn meta_from_entry(entry: &GridEntry) -> Result<GridMeta> {
    let dims = entry
        .dims
        .iter()
        .map(|&d| u64_to_usize(d, "grid dimension"))
        .collect::<Result<Vec<_>>>()?;
    padded_dims(&dims)?;
    if dims.contains(&0) {
        return Err(BrowseError::Format(format!(
            "grid {} has an empty dimension {:?}",
            entry.id, dims
        )));
    }
    if entry.left_edge.len() != dims.len() || entry.right_edge.len() != dims.len() {
        return Err(BrowseError::Format(format!(
            "grid {} edges do not match its rank {}",
            entry.id,
            dims.len()
        )));
    }
    Ok(GridMeta::new(
        entry.left_edge.clone(),
        entry.right_edge.clone(),
        entry.level,
        dims,
    ))
}

/// Open a container as a dataset. Only the header is read here; grid fields
/// are decoded on demand.
pub fn open_dataset<P: AsRef<Path>>(path: P, opts: ReadOptions) -> Result<Dataset> {
    let path = normalize_path(path);
    let mut file = File::open(&path)?;
    let (header, header_len, _header_json) = read_header_and_json(&mut file, &opts)?;
    let payload_start = grid_payload_start(header_len, header.payload_start);

    let mut records = Vec::with_capacity(header.grids.len());
    for (i, entry) in header.grids.iter().enumerate() {
        if entry.id != i as u64 {
            return Err(BrowseError::Format(format!(
                "grid ids must be dense and ordered: position {} holds id {}",
                i, entry.id
            )));
        }
        let parent = entry
            .parent
            .map(|p| u64_to_usize(p, "parent id").map(GridId))
            .transpose()?;
        records.push(GridRecord {
            meta: meta_from_entry(entry)?,
            parent,
            children: Vec::new(),
            store: FieldStore::Chunk(entry.clone()),
        });
    }

    let name = if header.dataset.is_empty() {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    } else {
        header.dataset.clone()
    };

    Dataset::from_records(
        name,
        header.field.clone(),
        records,
        Some(Backing {
            path,
            payload_start,
            opts,
        }),
    )
}

fn read_chunk_raw(file: &mut File, payload_start: u64, entry: &GridEntry) -> Result<Vec<u8>> {
    let grid = GridId(entry.id as usize);
    if entry.csize > MAX_CHUNK_CSIZE {
        return Err(BrowseError::Unsupported(format!(
            "grid {} csize exceeds configured limit",
            grid
        )));
    }
    if entry.usize > MAX_CHUNK_USIZE {
        return Err(BrowseError::Unsupported(format!(
            "grid {} usize exceeds configured limit",
            grid
        )));
    }

    let fs = file.metadata()?.len();
    let pos = checked_add_u64(payload_start, entry.offset)?;
    let end = checked_add_u64(pos, entry.csize)?;
    if end > fs {
        return Err(BrowseError::ChunkOutOfBounds {
            grid,
            offset: entry.offset,
            csize: entry.csize,
            payload_len: fs.saturating_sub(payload_start),
        });
    }

    file.seek(SeekFrom::Start(pos))?;
    let csz = u64_to_usize(entry.csize, "grid csize")?;
    let mut buf = vec![0u8; csz];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

fn decode_chunk_bytes(entry: &GridEntry, comp_bytes: Vec<u8>, validate: bool) -> Result<Vec<u8>> {
    let grid = GridId(entry.id as usize);
    let max_out = if entry.usize > 0 { entry.usize } else { MAX_CHUNK_USIZE };

    let raw = if entry.compression.eq_ignore_ascii_case("zlib") {
        zlib_decompress(&comp_bytes, max_out).map_err(|e| BrowseError::DecompressionFailed {
            grid,
            message: e.to_string(),
        })?
    } else {
        comp_bytes
    };

    if entry.usize > 0 && raw.len() as u64 != entry.usize {
        return Err(BrowseError::ChunkSizeMismatch {
            grid,
            expected: entry.usize,
            got: raw.len() as u64,
        });
    }

    if validate && entry.crc32 != 0 {
        let got = compute_crc32(&raw);
        if got != entry.crc32 {
            return Err(BrowseError::ChunkCrcMismatch {
                grid,
                expected: entry.crc32,
                got,
            });
        }
    }

    Ok(raw)
}

pub(crate) fn read_grid_field(backing: &Backing, entry: &GridEntry, meta: &GridMeta) -> Result<Field> {
    let mut file = File::open(&backing.path)?;
    let comp = read_chunk_raw(&mut file, backing.payload_start, entry)?;
    let raw = decode_chunk_bytes(entry, comp, backing.opts.validate)?;
    if raw.len() % BYTES_PER_SAMPLE != 0 {
        return Err(BrowseError::Format(format!(
            "grid {} payload is not a whole number of f64 samples",
            entry.id
        )));
    }
    let data: Vec<f64> = raw
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|b| {
            let mut a = [0u8; BYTES_PER_SAMPLE];
            a.copy_from_slice(b);
            f64::from_le_bytes(a)
        })
        .collect();
    debug!(grid = entry.id, samples = data.len(), "decoded grid field");
    Field::new(&meta.dims, data)
}

/// Visit every grid reachable from the roots in pre-order, parents first.
fn preorder(index: &dyn SpatialIndex) -> Result<Vec<(GridId, Option<GridId>)>> {
    let mut out = Vec::with_capacity(index.grid_count());
    let mut seen = HashSet::new();
    for root in index.roots() {
        let mut stack = vec![(root, None)];
        while let Some((id, parent)) = stack.pop() {
            if !seen.insert(id) {
                return Err(BrowseError::CyclicHierarchy { grid: id });
            }
            out.push((id, parent));
            let children = index.children(id)?;
            for child in children.into_iter().rev() {
                stack.push((child, Some(id)));
            }
        }
    }
    Ok(out)
}

/// Write every grid of `index` into a container at `path`.
pub fn write_dataset<P: AsRef<Path>>(path: P, index: &dyn SpatialIndex, name: &str, opts: WriteOptions) -> Result<()> {
    let path = normalize_path(path);

    let order = preorder(index)?;
    let dense: HashMap<GridId, u64> = order
        .iter()
        .enumerate()
        .map(|(i, (id, _))| (*id, i as u64))
        .collect();

    let mut chunks: Vec<Vec<u8>> = Vec::with_capacity(order.len());
    let mut grids: Vec<GridEntry> = Vec::with_capacity(order.len());

    for (i, (id, parent)) in order.iter().enumerate() {
        let meta = index.meta(*id)?;
        let field = index.field(*id)?;

        let mut raw = Vec::with_capacity(field.data().len() * BYTES_PER_SAMPLE);
        for v in field.data() {
            raw.extend_from_slice(&v.to_le_bytes());
        }
        let usize_u64 = raw.len() as u64;
        let crc32_u = if opts.crc { compute_crc32(&raw) } else { 0u32 };

        let mut stored = raw;
        let mut comp_tag = "none".to_string();

        let try_compress = if opts.compression {
            match opts.compression_mode {
                CompressionMode::Never => false,
                CompressionMode::Always => stored.len() >= COMPRESS_THRESHOLD_BYTES,
                CompressionMode::Auto => should_try_compress(&stored),
            }
        } else {
            false
        };

        if try_compress {
            let comp = zlib_compress(&stored, opts.compression_level)?;
            if comp.len() < stored.len() {
                stored = comp;
                comp_tag = "zlib".to_string();
            }
        }

        grids.push(GridEntry {
            id: i as u64,
            parent: parent.and_then(|p| dense.get(&p).copied()),
            level: meta.level,
            left_edge: meta.left_edge,
            right_edge: meta.right_edge,
            dims: meta.dims.iter().map(|&d| d as u64).collect(),
            compression: comp_tag,
            offset: 0,
            csize: stored.len() as u64,
            usize: usize_u64,
            crc32: crc32_u,
        });
        chunks.push(stored);
    }

    // Offsets relative to payload start
    let mut off = 0u64;
    for g in grids.iter_mut() {
        g.offset = off;
        off = off.saturating_add(g.csize);
    }
    let payload_bytes_total = off;

    let mut header = Header {
        format: "AMRT".to_string(),
        magic: "AMRTREE".to_string(),
        version: VERSION,
        endianness: "little".to_string(),
        order: "row-major".to_string(),
        dataset: name.to_string(),
        field: index.field_name().to_string(),
        created_utc: now_utc_string(),
        generator: format!("amrtui {}", env!("CARGO_PKG_VERSION")),
        grids,
        payload_start: 0,
        file_size: 0,
        header_crc32_hex: "00000000".to_string(),
    };

    // Iterate until header_len/payload_start/file_size stabilize, then CRC stabilizes.
    let mut header_json_final = String::new();
    let mut header_len_final: u32 = 0;

    for _ in 0..10 {
        header.header_crc32_hex = "00000000".to_string();
        let mut json_for_crc = if opts.pretty_header {
            serde_json::to_string_pretty(&header)?
        } else {
            serde_json::to_string(&header)?
        };
        json_for_crc.push('\n');
        header.header_crc32_hex = compute_header_crc32_hex(&json_for_crc);

        let mut json_final = if opts.pretty_header {
            serde_json::to_string_pretty(&header)?
        } else {
            serde_json::to_string(&header)?
        };
        json_final.push('\n');

        let header_len = u32::try_from(json_final.len())
            .map_err(|_| BrowseError::Unsupported("header too large".to_string()))?;
        let payload_start = 8u64 + 4u64 + header_len as u64;
        let file_size = payload_start + payload_bytes_total;

        let stable = header.payload_start == payload_start
            && header.file_size == file_size
            && header_len_final == header_len
            && header_json_final == json_final;

        header.payload_start = payload_start;
        header.file_size = file_size;
        header_json_final = json_final;
        header_len_final = header_len;

        if stable {
            break;
        }
    }

    // Atomic write in same dir
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    {
        let mut w = BufWriter::new(tmp.as_file_mut());
        w.write_all(&MAGIC_BYTES)?;
        write_u32_le(&mut w, header_len_final)?;
        w.write_all(header_json_final.as_bytes())?;
        for ck in &chunks {
            w.write_all(ck)?;
        }
        w.flush()?;
    }
    tmp.as_file().sync_all()?;

    if path.exists() {
        std::fs::remove_file(&path)?;
    }
    tmp.persist(&path).map_err(|e| BrowseError::Io(e.error))?;

    debug!(path = %path.display(), grids = chunks.len(), bytes = payload_bytes_total, "container written");
    Ok(())
}
