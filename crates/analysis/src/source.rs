//! Frame sources: the "fetch next frame or end-of-stream" input seam.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use strokelab_common::error::{StrokeError, StrokeResult};
use strokelab_model::frame::{BatBox, FrameIndex, FrameRecord, FrameStreamHeader};

/// Forward-only, finite sequence of frames.
///
/// A source is consumed once; a new run opens a new source.
pub trait FrameSource: Send {
    /// Next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> StrokeResult<Option<FrameRecord>>;

    /// Source name for logging.
    fn name(&self) -> &str;
}

/// In-memory source over an owned frame list.
pub struct VecFrameSource {
    frames: std::vec::IntoIter<FrameRecord>,
}

impl VecFrameSource {
    pub fn new(frames: Vec<FrameRecord>) -> Self {
        Self {
            frames: frames.into_iter(),
        }
    }
}

impl FrameSource for VecFrameSource {
    fn next_frame(&mut self) -> StrokeResult<Option<FrameRecord>> {
        Ok(self.frames.next())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Lazily parsed JSON Lines file, one frame per line.
///
/// Blank lines and `#` comment lines are skipped; the first comment line may
/// carry a [`FrameStreamHeader`]. Bat detections, when supplied, are
/// attached to frames by index as they are read.
pub struct JsonlFrameSource<R: BufRead + Send> {
    reader: R,
    name: String,
    line_number: usize,
    header: Option<FrameStreamHeader>,
    detections: BTreeMap<FrameIndex, BatBox>,
    buffer: String,
}

impl JsonlFrameSource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> StrokeResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StrokeError::FileNotFound {
                path: PathBuf::from(path),
            },
            _ => StrokeError::Io(e),
        })?;
        Ok(Self::from_reader(
            BufReader::new(file),
            path.display().to_string(),
        ))
    }
}

impl<R: BufRead + Send> JsonlFrameSource<R> {
    pub fn from_reader(reader: R, name: impl Into<String>) -> Self {
        Self {
            reader,
            name: name.into(),
            line_number: 0,
            header: None,
            detections: BTreeMap::new(),
            buffer: String::new(),
        }
    }

    /// Attach the best bat box per frame to frames as they are read.
    pub fn with_detections(mut self, detections: BTreeMap<FrameIndex, BatBox>) -> Self {
        self.detections = detections;
        self
    }

    /// Header seen so far, if the stream had one.
    pub fn header(&self) -> Option<&FrameStreamHeader> {
        self.header.as_ref()
    }
}

impl<R: BufRead + Send> FrameSource for JsonlFrameSource<R> {
    fn next_frame(&mut self) -> StrokeResult<Option<FrameRecord>> {
        loop {
            self.buffer.clear();
            if self.reader.read_line(&mut self.buffer)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let line = self.buffer.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(comment) = line.strip_prefix('#') {
                if self.line_number == 1 {
                    self.header = serde_json::from_str(comment.trim()).ok();
                }
                continue;
            }

            let mut frame: FrameRecord = serde_json::from_str(line).map_err(|e| {
                StrokeError::invalid_input(format!(
                    "{}:{}: malformed frame record: {e}",
                    self.name, self.line_number
                ))
            })?;
            if let Some(bat) = self.detections.get(&frame.index) {
                frame.bat = Some(*bat);
            }
            return Ok(Some(frame));
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Rejects frames whose index does not strictly increase.
#[derive(Debug, Clone, Default)]
pub struct FrameOrderValidator {
    previous: Option<FrameIndex>,
}

impl FrameOrderValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, frame: &FrameRecord) -> StrokeResult<()> {
        // Spans are stored as start plus length.
        if frame.index == FrameIndex::MAX {
            return Err(StrokeError::invalid_input(format!(
                "frame index {} is out of range",
                frame.index
            )));
        }
        if let Some(previous) = self.previous {
            if frame.index <= previous {
                return Err(StrokeError::OutOfOrder {
                    previous,
                    current: frame.index,
                });
            }
        }
        self.previous = Some(frame.index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn drain(source: &mut dyn FrameSource) -> StrokeResult<Vec<FrameRecord>> {
        let mut frames = Vec::new();
        while let Some(frame) = source.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    #[test]
    fn test_jsonl_source_reads_lazily_and_parses_header() {
        let data = "# {\"schema_version\":\"1.0\",\"fps_hint\":30.0,\"source\":\"mediapipe\"}\n\
                    {\"frame\":0,\"t\":0}\n\
                    \n\
                    {\"frame\":1,\"t\":33333333}\n";
        let mut source = JsonlFrameSource::from_reader(Cursor::new(data), "inline");
        let frames = drain(&mut source).unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].index, 1);
        assert_eq!(source.header().unwrap().source, "mediapipe");
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let data = "{\"frame\":0,\"t\":0}\n{\"frame\":\"one\"}\n";
        let mut source = JsonlFrameSource::from_reader(Cursor::new(data), "clip.jsonl");
        let err = drain(&mut source).unwrap_err();
        assert!(err.is_input_error());
        assert!(err.to_string().contains("clip.jsonl:2"));
    }

    #[test]
    fn test_detections_attach_by_index() {
        let data = "{\"frame\":0,\"t\":0}\n{\"frame\":1,\"t\":1}\n";
        let mut detections = BTreeMap::new();
        detections.insert(
            1,
            BatBox {
                x1: 0.1,
                y1: 0.1,
                x2: 0.2,
                y2: 0.3,
                confidence: 0.9,
            },
        );
        let mut source =
            JsonlFrameSource::from_reader(Cursor::new(data), "inline").with_detections(detections);
        let frames = drain(&mut source).unwrap();
        assert!(frames[0].bat.is_none());
        assert!(frames[1].bat.is_some());
    }

    #[test]
    fn test_open_missing_file() {
        let err = JsonlFrameSource::open("/nonexistent/frames.jsonl").err().unwrap();
        assert!(matches!(err, StrokeError::FileNotFound { .. }));
    }

    #[test]
    fn test_order_validator() {
        let mut validator = FrameOrderValidator::new();
        validator.check(&FrameRecord::empty(0, 0)).unwrap();
        validator.check(&FrameRecord::empty(2, 10)).unwrap();
        let err = validator.check(&FrameRecord::empty(2, 20)).unwrap_err();
        assert!(matches!(err, StrokeError::OutOfOrder { previous: 2, current: 2 }));
    }

    #[test]
    fn test_max_frame_index_rejected() {
        let mut validator = FrameOrderValidator::new();
        validator.check(&FrameRecord::empty(u64::MAX - 1, 0)).unwrap();
        let err = validator.check(&FrameRecord::empty(u64::MAX, 10)).unwrap_err();
        assert!(matches!(err, StrokeError::InvalidInput { .. }));
    }

    #[test]
    fn test_vec_source() {
        let mut source = VecFrameSource::new(vec![FrameRecord::empty(0, 0)]);
        assert_eq!(drain(&mut source).unwrap().len(), 1);
    }
}
