//! Chunked compression pipeline
//!
//! [`StreamingCompressor`] turns a stream of input chunks into a stream of
//! compressed chunks. In [`StreamMode::Continuous`] one encoder runs across
//! the whole stream and is flushed after every chunk, so the concatenated
//! output is a single valid stream for any decoder. In
//! [`StreamMode::PerChunk`] every chunk is compressed as a standalone unit;
//! the concatenation is then a sequence of independent streams, which only
//! multi-member aware decoders (gzip) read back in full.

use crate::compressor::{CompressionAlgorithm, Compressor};
use async_compression::tokio::write::{BrotliEncoder, GzipEncoder, ZlibEncoder};
use async_compression::Level;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use squish_core::{Error, Result};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// How the pipeline treats chunk boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamMode {
    /// One encoder state across all chunks, finished at end of stream
    #[default]
    Continuous,
    /// Each chunk compressed independently
    PerChunk,
}

/// Chunk-oriented adapter around a [`Compressor`]
#[derive(Debug, Clone, Copy)]
pub struct StreamingCompressor {
    compressor: Compressor,
    level: i32,
    mode: StreamMode,
}

impl StreamingCompressor {
    /// Wrap `compressor`; `level` is clamped like in the buffered path
    pub fn new(compressor: Compressor, level: i32, mode: StreamMode) -> Self {
        Self {
            compressor,
            level,
            mode,
        }
    }

    /// Encoding token of the wrapped compressor
    pub fn encoding(&self) -> &'static str {
        self.compressor.encoding()
    }

    /// Chunk boundary handling
    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Compress `input` chunk by chunk.
    ///
    /// The first failure ends the stream with that error; nothing is
    /// emitted after it.
    pub fn pipe<S>(&self, input: S) -> impl Stream<Item = Result<Bytes>> + Send
    where
        S: Stream<Item = Bytes> + Send + Unpin,
    {
        let encoder = ChunkEncoder::new(self.compressor, self.level, self.mode);
        stream::try_unfold((Some(encoder), input), pump)
            .try_filter(|chunk| futures::future::ready(!chunk.is_empty()))
    }

    /// Split `payload` into `chunk_size` pieces, run them through the
    /// pipeline and concatenate the output
    pub async fn compress(&self, payload: Bytes, chunk_size: usize) -> Result<Bytes> {
        let input = stream::iter(Chunks::new(payload, chunk_size));
        let parts: Vec<Bytes> = self.pipe(input).try_collect().await?;

        let mut out = BytesMut::with_capacity(parts.iter().map(Bytes::len).sum());
        for part in parts {
            out.extend_from_slice(&part);
        }
        Ok(out.freeze())
    }
}

type PumpState<S> = (Option<ChunkEncoder>, S);

async fn pump<S>((encoder, mut input): PumpState<S>) -> Result<Option<(Bytes, PumpState<S>)>>
where
    S: Stream<Item = Bytes> + Unpin,
{
    let Some(mut encoder) = encoder else {
        return Ok(None);
    };

    match input.next().await {
        Some(chunk) => {
            let out = encoder.push(&chunk).await?;
            Ok(Some((out, (Some(encoder), input))))
        }
        None => {
            let out = encoder.finish().await?;
            Ok(Some((out, (None, input))))
        }
    }
}

enum ChunkEncoder {
    Gzip(GzipEncoder<Vec<u8>>),
    Deflate(ZlibEncoder<Vec<u8>>),
    Brotli(BrotliEncoder<Vec<u8>>),
    PerChunk { compressor: Compressor, level: i32 },
}

impl ChunkEncoder {
    fn new(compressor: Compressor, level: i32, mode: StreamMode) -> Self {
        if mode == StreamMode::PerChunk {
            return Self::PerChunk { compressor, level };
        }

        let algorithm = compressor.algorithm();
        let quality = Level::Precise(algorithm.clamp_level(level) as i32);
        match algorithm {
            CompressionAlgorithm::Gzip => Self::Gzip(GzipEncoder::with_quality(Vec::new(), quality)),
            CompressionAlgorithm::Deflate => {
                Self::Deflate(ZlibEncoder::with_quality(Vec::new(), quality))
            }
            CompressionAlgorithm::Brotli => {
                Self::Brotli(BrotliEncoder::with_quality(Vec::new(), quality))
            }
        }
    }

    fn encoding(&self) -> &'static str {
        match self {
            Self::Gzip(_) => "gzip",
            Self::Deflate(_) => "deflate",
            Self::Brotli(_) => "br",
            Self::PerChunk { compressor, .. } => compressor.encoding(),
        }
    }

    /// Feed one chunk and return whatever output it produced
    async fn push(&mut self, chunk: &[u8]) -> Result<Bytes> {
        let encoding = self.encoding();
        let written = match self {
            Self::PerChunk { compressor, level } => return compressor.compress(chunk, *level),
            Self::Gzip(encoder) => write_and_flush(encoder, chunk).await,
            Self::Deflate(encoder) => write_and_flush(encoder, chunk).await,
            Self::Brotli(encoder) => write_and_flush(encoder, chunk).await,
        };
        written.map_err(|e| Error::codec(encoding, e))?;
        Ok(self.take_output())
    }

    /// Close the stream and return the trailing output
    async fn finish(&mut self) -> Result<Bytes> {
        let encoding = self.encoding();
        let finished = match self {
            Self::PerChunk { .. } => return Ok(Bytes::new()),
            Self::Gzip(encoder) => encoder.shutdown().await,
            Self::Deflate(encoder) => encoder.shutdown().await,
            Self::Brotli(encoder) => encoder.shutdown().await,
        };
        finished.map_err(|e| Error::codec(encoding, e))?;
        Ok(self.take_output())
    }

    fn take_output(&mut self) -> Bytes {
        let buf = match self {
            Self::PerChunk { .. } => return Bytes::new(),
            Self::Gzip(encoder) => encoder.get_mut(),
            Self::Deflate(encoder) => encoder.get_mut(),
            Self::Brotli(encoder) => encoder.get_mut(),
        };
        Bytes::from(std::mem::take(buf))
    }
}

async fn write_and_flush<W>(writer: &mut W, chunk: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(chunk).await?;
    writer.flush().await
}

/// Splits a buffer into fixed-size chunks without copying
#[derive(Debug)]
struct Chunks {
    rest: Bytes,
    size: usize,
}

impl Chunks {
    fn new(payload: Bytes, size: usize) -> Self {
        Self {
            rest: payload,
            size: size.max(1),
        }
    }
}

impl Iterator for Chunks {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        if self.rest.is_empty() {
            return None;
        }
        let at = self.size.min(self.rest.len());
        Some(self.rest.split_to(at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compressor::tests::decompress;
    use std::io::Read;

    const ALL: [CompressionAlgorithm; 3] = [
        CompressionAlgorithm::Gzip,
        CompressionAlgorithm::Deflate,
        CompressionAlgorithm::Brotli,
    ];

    fn payload() -> Bytes {
        Bytes::from(r#"{"id":1,"title":"Test product","content":"Some test content"},"#.repeat(400))
    }

    #[test]
    fn test_chunks_split_without_loss() {
        let chunks: Vec<Bytes> = Chunks::new(Bytes::from_static(b"abcdefg"), 3).collect();
        assert_eq!(chunks, vec!["abc", "def", "g"]);

        assert_eq!(Chunks::new(Bytes::new(), 3).count(), 0);
        // zero chunk size still makes progress
        assert_eq!(Chunks::new(Bytes::from_static(b"ab"), 0).count(), 2);
    }

    #[tokio::test]
    async fn test_continuous_output_is_one_valid_stream() {
        let data = payload();
        for algorithm in ALL {
            let streaming =
                StreamingCompressor::new(Compressor::new(algorithm), 6, StreamMode::Continuous);
            let compressed = streaming.compress(data.clone(), 1024).await.unwrap();
            assert_eq!(decompress(algorithm, &compressed), data.to_vec(), "{algorithm}");
        }
    }

    #[tokio::test]
    async fn test_continuous_gzip_is_single_member() {
        let data = payload();
        let streaming = StreamingCompressor::new(
            Compressor::new(CompressionAlgorithm::Gzip),
            6,
            StreamMode::Continuous,
        );
        let compressed = streaming.compress(data.clone(), 512).await.unwrap();

        // a single-member decoder reads everything
        let mut out = Vec::new();
        flate2::read::GzDecoder::new(&compressed[..])
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, data.to_vec());
    }

    #[tokio::test]
    async fn test_per_chunk_matches_independent_compression() {
        let data = payload();
        let compressor = Compressor::new(CompressionAlgorithm::Gzip);
        let streaming = StreamingCompressor::new(compressor, 6, StreamMode::PerChunk);

        let compressed = streaming.compress(data.clone(), 4096).await.unwrap();

        let mut expected = Vec::new();
        for chunk in Chunks::new(data.clone(), 4096) {
            expected.extend_from_slice(&compressor.compress(&chunk, 6).unwrap());
        }
        assert_eq!(compressed.to_vec(), expected);

        // gzip members concatenate into a valid multi-member file
        assert_eq!(
            decompress(CompressionAlgorithm::Gzip, &compressed),
            data.to_vec()
        );
    }

    #[tokio::test]
    async fn test_per_chunk_single_chunk_equals_buffered() {
        let data = Bytes::from_static(b"short enough for one chunk");
        for algorithm in ALL {
            let compressor = Compressor::new(algorithm);
            let streaming = StreamingCompressor::new(compressor, 4, StreamMode::PerChunk);
            let compressed = streaming.compress(data.clone(), 1024).await.unwrap();
            assert_eq!(compressed, compressor.compress(&data, 4).unwrap());
        }
    }

    #[tokio::test]
    async fn test_pipe_emits_incrementally() {
        let chunks = vec![
            Bytes::from("first chunk of the body, ".repeat(50)),
            Bytes::from("second chunk of the body, ".repeat(50)),
        ];
        let streaming = StreamingCompressor::new(
            Compressor::new(CompressionAlgorithm::Deflate),
            9,
            StreamMode::Continuous,
        );

        let outputs: Vec<Bytes> = streaming
            .pipe(stream::iter(chunks.clone()))
            .try_collect()
            .await
            .unwrap();

        // a flushed block per input chunk, plus the stream trailer
        assert!(outputs.len() >= 2);
        assert!(outputs.iter().all(|b| !b.is_empty()));

        let joined: Vec<u8> = outputs.concat();
        let expected: Vec<u8> = chunks.concat();
        assert_eq!(decompress(CompressionAlgorithm::Deflate, &joined), expected);
    }

    #[tokio::test]
    async fn test_empty_input_still_produces_valid_stream() {
        for algorithm in ALL {
            let streaming =
                StreamingCompressor::new(Compressor::new(algorithm), 6, StreamMode::Continuous);
            let compressed = streaming.compress(Bytes::new(), 1024).await.unwrap();
            assert!(!compressed.is_empty());
            assert!(decompress(algorithm, &compressed).is_empty());
        }
    }

    #[test]
    fn test_encoding() {
        let streaming = StreamingCompressor::new(
            Compressor::new(CompressionAlgorithm::Brotli),
            5,
            StreamMode::PerChunk,
        );
        assert_eq!(streaming.encoding(), "br");
        assert_eq!(streaming.mode(), StreamMode::PerChunk);
    }
}
