//! Binary parameter checkpoints.
//!
//! Layout, all little-endian:
//!
//! | bytes   | content                                              |
//! |---------|------------------------------------------------------|
//! | 4       | magic `DRP1`                                         |
//! | 4       | format version (`1`)                                 |
//! | 8 × 4   | config: latent width, layers, steps, output width,   |
//! |         | mesh width, aggregator id, gate norm flag, percent   |
//! | 4       | CRC32 of the payload                                 |
//! | rest    | payload: every `f32` parameter                       |
//!
//! The payload stores each MLP as its layers (weights, then bias) followed
//! by the layer-norm gain and shift if it has one. MLPs appear in the order
//! node encoder, edge encoder, (edge net, node net) per step, gate
//! expansion, gate reduction, decoder. Every width follows from the config
//! header, so none are stored.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::info;

use drape_core::{DrapeError, DrapeResult};

use crate::config::ModelConfig;
use crate::mlp::{Mlp, MlpShape};
use crate::nn::{LayerNorm, Linear};
use crate::params::{BlockParams, ModelParams, Shapes};
use crate::segment::Aggregator;

const MAGIC: &[u8; 4] = b"DRP1";
const VERSION: u32 = 1;

fn checkpoint_err(message: impl Into<String>) -> DrapeError {
    DrapeError::Checkpoint {
        message: message.into(),
    }
}

fn header_word(value: usize, field: &str) -> DrapeResult<u32> {
    u32::try_from(value)
        .map_err(|_| checkpoint_err(format!("{field} {value} does not fit the u32 header")))
}

/// Writes `params` and the `config` they were built for.
///
/// # Errors
///
/// Returns [`DrapeError::InvalidConfiguration`] if `params` does not fit
/// `config`, or [`DrapeError::Checkpoint`] if writing fails.
pub fn save<W: Write>(writer: &mut W, config: &ModelConfig, params: &ModelParams) -> DrapeResult<()> {
    params.validate(config)?;
    let write_err = |e: std::io::Error| checkpoint_err(format!("write failed: {e}"));

    let mut payload = Vec::with_capacity(params.param_count() * 4);
    for mlp in params.mlps() {
        write_mlp(&mut payload, mlp);
    }
    let checksum = crc32fast::hash(&payload);

    writer.write_all(MAGIC).map_err(write_err)?;
    let header = [
        VERSION,
        header_word(config.latent_width, "latent_width")?,
        header_word(config.num_layers, "num_layers")?,
        header_word(config.message_passing_steps, "message_passing_steps")?,
        header_word(config.output_width, "output_width")?,
        header_word(config.mesh_pos_width, "mesh_pos_width")?,
        config.aggregator.id(),
        u32::from(config.normalize_gate),
        config.salience_percent,
        checksum,
    ];
    for word in header {
        writer.write_all(&word.to_le_bytes()).map_err(write_err)?;
    }
    writer.write_all(&payload).map_err(write_err)?;
    writer.flush().map_err(write_err)
}

/// Reads a checkpoint written by [`save`].
///
/// # Errors
///
/// Returns [`DrapeError::Checkpoint`] on a bad magic, unknown version,
/// invalid header, checksum mismatch or truncated payload.
pub fn load<R: Read>(reader: &mut R) -> DrapeResult<(ModelConfig, ModelParams)> {
    let read_err = |e: std::io::Error| checkpoint_err(format!("read failed: {e}"));

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(read_err)?;
    if &magic != MAGIC {
        return Err(checkpoint_err(format!(
            "expected magic 'DRP1', got '{}'",
            String::from_utf8_lossy(&magic)
        )));
    }

    let mut read_u32 = || -> DrapeResult<u32> {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf).map_err(read_err)?;
        Ok(u32::from_le_bytes(buf))
    };
    let version = read_u32()?;
    if version != VERSION {
        return Err(checkpoint_err(format!(
            "unsupported version {version}, expected {VERSION}"
        )));
    }
    let latent_width = read_u32()? as usize;
    let num_layers = read_u32()? as usize;
    let message_passing_steps = read_u32()? as usize;
    let output_width = read_u32()? as usize;
    let mesh_pos_width = read_u32()? as usize;
    let aggregator = Aggregator::from_id(read_u32()?).map_err(|e| checkpoint_err(e.to_string()))?;
    let normalize_gate = match read_u32()? {
        0 => false,
        1 => true,
        other => return Err(checkpoint_err(format!("bad gate norm flag {other}"))),
    };
    let salience_percent = read_u32()?;
    let stored_checksum = read_u32()?;

    let config = ModelConfig {
        aggregator,
        message_passing_steps,
        latent_width,
        num_layers,
        output_width,
        mesh_pos_width,
        normalize_gate,
        salience_percent,
    };
    config
        .validate()
        .map_err(|e| checkpoint_err(format!("header describes an invalid model: {e}")))?;

    let mut payload = Vec::new();
    reader.read_to_end(&mut payload).map_err(read_err)?;
    let computed = crc32fast::hash(&payload);
    if computed != stored_checksum {
        return Err(checkpoint_err(format!(
            "checksum mismatch: stored {stored_checksum:#010x}, computed {computed:#010x}"
        )));
    }

    let shapes = Shapes::for_config(&config);
    let mut cursor = Cursor::new(&payload);
    let node_encoder = cursor.mlp(&shapes.node_encoder)?;
    let edge_encoder = cursor.mlp(&shapes.edge_encoder)?;
    let blocks = (0..config.message_passing_steps)
        .map(|_| {
            Ok(BlockParams {
                edge_net: cursor.mlp(&shapes.edge_net)?,
                node_net: cursor.mlp(&shapes.node_net)?,
            })
        })
        .collect::<DrapeResult<Vec<_>>>()?;
    let params = ModelParams {
        node_encoder,
        edge_encoder,
        blocks,
        expand: cursor.mlp(&shapes.expand)?,
        reduce: cursor.mlp(&shapes.reduce)?,
        decoder: cursor.mlp(&shapes.decoder)?,
    };
    if cursor.remaining() != 0 {
        return Err(checkpoint_err(format!(
            "{} trailing bytes after parameters",
            cursor.remaining()
        )));
    }
    Ok((config, params))
}

/// [`save`] to a file, creating or truncating it.
pub fn save_to_path<P: AsRef<Path>>(
    path: P,
    config: &ModelConfig,
    params: &ModelParams,
) -> DrapeResult<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .map_err(|e| checkpoint_err(format!("cannot create {}: {e}", path.display())))?;
    save(&mut BufWriter::new(file), config, params)?;
    info!(path = %path.display(), params = params.param_count(), "saved checkpoint");
    Ok(())
}

/// [`load`] from a file.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> DrapeResult<(ModelConfig, ModelParams)> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| checkpoint_err(format!("cannot open {}: {e}", path.display())))?;
    let loaded = load(&mut BufReader::new(file))?;
    info!(path = %path.display(), params = loaded.1.param_count(), "loaded checkpoint");
    Ok(loaded)
}

fn write_f32s(out: &mut Vec<u8>, values: &[f32]) {
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

fn write_mlp(out: &mut Vec<u8>, mlp: &Mlp) {
    for layer in mlp.layers() {
        write_f32s(out, layer.weights());
        write_f32s(out, layer.bias());
    }
    if let Some(norm) = mlp.norm() {
        write_f32s(out, norm.gamma());
        write_f32s(out, norm.beta());
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn f32s(&mut self, n: usize) -> DrapeResult<Vec<f32>> {
        let bytes = n * 4;
        if self.remaining() < bytes {
            return Err(checkpoint_err(format!(
                "payload truncated: need {bytes} more bytes, {} left",
                self.remaining()
            )));
        }
        let chunk = &self.buf[self.pos..self.pos + bytes];
        self.pos += bytes;
        Ok(chunk
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    fn mlp(&mut self, shape: &MlpShape) -> DrapeResult<Mlp> {
        let mut widths = vec![shape.input_width];
        widths.extend(std::iter::repeat(shape.hidden_width).take(shape.num_layers - 1));
        widths.push(shape.output_width);

        let mut layers = Vec::with_capacity(shape.num_layers);
        for w in widths.windows(2) {
            let (in_dim, out_dim) = (w[0], w[1]);
            let weights = self.f32s(in_dim * out_dim)?;
            let bias = self.f32s(out_dim)?;
            layers.push(Linear::from_weights_and_bias(weights, bias, in_dim, out_dim)?);
        }
        let norm = if shape.layer_norm {
            let gamma = self.f32s(shape.output_width)?;
            let beta = self.f32s(shape.output_width)?;
            Some(LayerNorm::from_parts(gamma, beta)?)
        } else {
            None
        };
        Mlp::from_layers(layers, norm)
    }
}
