use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::buffer::AudioBuffer;
use crate::error::AnalysisError;

/// Decodes the first audio track of `path`, keeping every channel.
pub fn decode_audio(path: &Path) -> Result<AudioBuffer, AnalysisError> {
    let mut reader = TrackReader::open(path)?;
    let mut interleaved = Vec::new();
    while reader.read_block(&mut interleaved)? {}

    let buffer =
        AudioBuffer::from_interleaved(reader.sample_rate, reader.channels.max(1), &interleaved)?;
    log::info!(
        "Decoded {}: {} channel(s) at {}Hz, {:.1}s ({} corrupt packets skipped)",
        path.display(),
        buffer.channel_count(),
        buffer.sample_rate(),
        buffer.duration(),
        reader.skipped
    );
    Ok(buffer)
}

/// One audio track of a container, read packet by packet.
struct TrackReader {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    /// 0 until the container or the first decoded packet reports a layout
    channels: usize,
    scratch: Option<SampleBuffer<f32>>,
    skipped: usize,
}

impl TrackReader {
    fn open(path: &Path) -> Result<Self, AnalysisError> {
        let source = MediaSourceStream::new(Box::new(File::open(path)?), Default::default());
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }
        let format = symphonia::default::get_probe()
            .format(&hint, source, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| decode_error("unrecognised container", e))?
            .format;

        let (track_id, params) = format
            .tracks()
            .iter()
            .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
            .map(|track| (track.id, track.codec_params.clone()))
            .ok_or_else(|| AnalysisError::Decode("no audio track".into()))?;
        let sample_rate = params
            .sample_rate
            .ok_or_else(|| AnalysisError::Decode("track has no sample rate".into()))?;
        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| decode_error("unsupported codec", e))?;

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            channels: params.channels.map_or(0, |c| c.count()),
            scratch: None,
            skipped: 0,
        })
    }

    /// Appends the next packet's samples to `out`; `false` at end of stream.
    fn read_block(&mut self, out: &mut Vec<f32>) -> Result<bool, AnalysisError> {
        let packet = match self.format.next_packet() {
            Ok(packet) => packet,
            Err(err) if is_end_of_stream(&err) => return Ok(false),
            Err(err) => return Err(decode_error("read failed", err)),
        };
        if packet.track_id() != self.track_id {
            return Ok(true);
        }

        let decoded = match self.decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(reason)) => {
                log::debug!("Packet at ts {} skipped: {}", packet.ts(), reason);
                self.skipped += 1;
                return Ok(true);
            }
            Err(err) => return Err(decode_error("decode failed", err)),
        };

        let spec = *decoded.spec();
        if self.channels == 0 {
            self.channels = spec.channels.count();
        }
        let frames = decoded.capacity() as u64;
        let needed = frames as usize * spec.channels.count();
        if self.scratch.as_ref().is_some_and(|buf| buf.capacity() < needed) {
            self.scratch = None;
        }
        let scratch = self.scratch.get_or_insert_with(|| SampleBuffer::new(frames, spec));
        scratch.copy_interleaved_ref(decoded);
        out.extend_from_slice(scratch.samples());
        Ok(true)
    }
}

fn is_end_of_stream(err: &SymphoniaError) -> bool {
    matches!(err, SymphoniaError::IoError(io) if io.kind() == std::io::ErrorKind::UnexpectedEof)
}

fn decode_error(context: &str, err: SymphoniaError) -> AnalysisError {
    AnalysisError::Decode(format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_eof_ends_the_stream() {
        let eof = SymphoniaError::IoError(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
        assert!(is_end_of_stream(&eof));
        let other = SymphoniaError::IoError(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(!is_end_of_stream(&other));
        assert!(!is_end_of_stream(&SymphoniaError::DecodeError("bad frame")));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = decode_audio(Path::new("/nonexistent/stepchart/song.wav")).unwrap_err();
        assert!(matches!(err, AnalysisError::Io(_)));
    }
}
