//! Document package capability and its PPTX implementation.
//!
//! The substitution engine only needs two things from a document: walk its
//! text nodes in order ([`TextNodes`]) and write changes back
//! ([`Package::commit`]). [`PptxPackage`] provides both for OOXML decks.
//!
//! # PPTX model
//!
//! A `.pptx` file is a zip archive. Every entry is kept in memory in archive
//! order. Slide parts (`ppt/slides/slideN.xml`) are additionally parsed into
//! a `quick-xml` event list; the character data of each DrawingML run text
//! element (`<a:t>`) becomes one [`TextNode`]. Slides are exposed in slide
//! number order. On commit only slides whose text actually changed are
//! re-serialized; every other entry is written back byte for byte.

use std::fmt::Display;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{io_err, PackageError};

const SLIDE_PREFIX: &str = "ppt/slides/slide";
const SLIDE_SUFFIX: &str = ".xml";
/// DrawingML run text. Decks always bind DrawingML to the `a` prefix.
const TEXT_ELEMENT: &[u8] = b"a:t";

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// A span of plain (unescaped) text inside a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNode {
    text: String,
}

impl TextNode {
    pub fn new(text: impl Into<String>) -> Self {
        TextNode { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: String) {
        self.text = text;
    }
}

/// Enumerate a document's text nodes in document order.
pub trait TextNodes {
    fn text_nodes(&self) -> Box<dyn Iterator<Item = &TextNode> + '_>;
    fn text_nodes_mut(&mut self) -> Box<dyn Iterator<Item = &mut TextNode> + '_>;
}

/// A document whose text changes can be persisted to its backing file.
pub trait Package: TextNodes {
    fn commit(&mut self) -> Result<(), PackageError>;
}

// ---------------------------------------------------------------------------
// Internal parts
// ---------------------------------------------------------------------------

struct Entry {
    name: String,
    data: Vec<u8>,
    method: CompressionMethod,
    is_dir: bool,
}

struct TextSlot {
    /// Index of the `Event::Text` this node was read from.
    event: usize,
    original: String,
    node: TextNode,
}

struct SlidePart {
    entry: usize,
    number: u32,
    events: Vec<Event<'static>>,
    slots: Vec<TextSlot>,
}

impl SlidePart {
    fn parse(entry: usize, number: u32, name: &str, data: &[u8]) -> Result<Self, PackageError> {
        let xml = std::str::from_utf8(data).map_err(|e| malformed(name, e))?;
        let mut reader = Reader::from_str(xml);
        let mut events = Vec::new();
        let mut slots = Vec::new();
        let mut in_text = false;

        loop {
            let event = reader.read_event().map_err(|e| malformed(name, e))?;
            match &event {
                Event::Eof => break,
                Event::Start(e) if e.name().as_ref() == TEXT_ELEMENT => in_text = true,
                Event::End(e) if e.name().as_ref() == TEXT_ELEMENT => in_text = false,
                Event::Text(t) if in_text => {
                    let text = t.unescape().map_err(|e| malformed(name, e))?.into_owned();
                    slots.push(TextSlot {
                        event: events.len(),
                        original: text.clone(),
                        node: TextNode::new(text),
                    });
                }
                _ => {}
            }
            events.push(event.into_owned());
        }

        Ok(SlidePart {
            entry,
            number,
            events,
            slots,
        })
    }

    fn is_dirty(&self) -> bool {
        self.slots.iter().any(|s| s.node.text != s.original)
    }

    fn serialize(&self, name: &str) -> Result<Vec<u8>, PackageError> {
        let mut writer = Writer::new(Vec::new());
        let mut slots = self.slots.iter().peekable();
        for (index, event) in self.events.iter().enumerate() {
            let written = match slots.next_if(|slot| slot.event == index) {
                Some(slot) => writer.write_event(Event::Text(BytesText::new(slot.node.text()))),
                None => writer.write_event(event.borrow()),
            };
            written.map_err(|e| write_err(name, e))?;
        }
        Ok(writer.into_inner())
    }

    fn mark_clean(&mut self) {
        for slot in &mut self.slots {
            slot.original.clone_from(&slot.node.text);
        }
    }
}

// ---------------------------------------------------------------------------
// PptxPackage
// ---------------------------------------------------------------------------

/// An opened `.pptx` deck backed by a file on disk.
pub struct PptxPackage {
    path: PathBuf,
    entries: Vec<Entry>,
    slides: Vec<SlidePart>,
}

impl PptxPackage {
    /// Open and parse the deck at `path`.
    pub fn open(path: &Path) -> Result<Self, PackageError> {
        let file = File::open(path).map_err(|e| io_err(path, e))?;
        Self::from_reader(BufReader::new(file), path)
    }

    /// Parse a deck from any seekable reader; `origin` becomes the commit target.
    pub fn from_reader<R: Read + Seek>(reader: R, origin: &Path) -> Result<Self, PackageError> {
        let mut archive = ZipArchive::new(reader).map_err(|e| archive_err(origin, e))?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).map_err(|e| archive_err(origin, e))?;
            let mut data = Vec::new();
            file.read_to_end(&mut data).map_err(|e| io_err(origin, e))?;
            entries.push(Entry {
                name: file.name().to_string(),
                method: file.compression(),
                is_dir: file.is_dir(),
                data,
            });
        }

        let mut slides = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            if let Some(number) = slide_number(&entry.name) {
                slides.push(SlidePart::parse(index, number, &entry.name, &entry.data)?);
            }
        }
        if slides.is_empty() {
            return Err(PackageError::NoSlides {
                path: origin.to_path_buf(),
            });
        }
        slides.sort_by_key(|s| s.number);

        tracing::debug!(
            "opened {} ({} entries, {} slides)",
            origin.display(),
            entries.len(),
            slides.len()
        );
        Ok(PptxPackage {
            path: origin.to_path_buf(),
            entries,
            slides,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    /// Text nodes grouped by slide number, for reporting.
    pub fn slides(&self) -> impl Iterator<Item = (u32, Vec<&TextNode>)> {
        self.slides
            .iter()
            .map(|s| (s.number, s.slots.iter().map(|slot| &slot.node).collect()))
    }

    /// Serialize the whole package, including pending text changes, to bytes.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>, PackageError> {
        self.flush()?;
        let cursor = self.write_archive(Cursor::new(Vec::new()))?;
        Ok(cursor.into_inner())
    }

    /// Re-serialize every slide whose text changed since it was parsed or
    /// last flushed. Nothing touches the disk.
    pub fn flush(&mut self) -> Result<(), PackageError> {
        for slide in &mut self.slides {
            if !slide.is_dirty() {
                continue;
            }
            let entry = &mut self.entries[slide.entry];
            entry.data = slide.serialize(&entry.name)?;
            slide.mark_clean();
        }
        Ok(())
    }

    fn write_archive<W: Write + Seek>(&self, sink: W) -> Result<W, PackageError> {
        let mut zip = ZipWriter::new(sink);
        for entry in &self.entries {
            let method = match entry.method {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let options = SimpleFileOptions::default().compression_method(method);
            if entry.is_dir {
                zip.add_directory(entry.name.as_str(), options)
                    .map_err(|e| write_err(&entry.name, e))?;
                continue;
            }
            zip.start_file(entry.name.as_str(), options)
                .map_err(|e| write_err(&entry.name, e))?;
            zip.write_all(&entry.data)
                .map_err(|e| write_err(&entry.name, e))?;
        }
        zip.finish().map_err(|e| write_err("archive", e))
    }
}

impl TextNodes for PptxPackage {
    fn text_nodes(&self) -> Box<dyn Iterator<Item = &TextNode> + '_> {
        Box::new(
            self.slides
                .iter()
                .flat_map(|s| s.slots.iter().map(|slot| &slot.node)),
        )
    }

    fn text_nodes_mut(&mut self) -> Box<dyn Iterator<Item = &mut TextNode> + '_> {
        Box::new(
            self.slides
                .iter_mut()
                .flat_map(|s| s.slots.iter_mut().map(|slot| &mut slot.node)),
        )
    }
}

impl Package for PptxPackage {
    /// Rewrite the backing file with every entry plus the changed slides.
    fn commit(&mut self) -> Result<(), PackageError> {
        self.flush()?;
        let file = File::create(&self.path).map_err(|e| io_err(&self.path, e))?;
        let mut sink = self.write_archive(BufWriter::new(file))?;
        sink.flush().map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `ppt/slides/slide12.xml` → `Some(12)`; anything else → `None`.
fn slide_number(name: &str) -> Option<u32> {
    let digits = name.strip_prefix(SLIDE_PREFIX)?.strip_suffix(SLIDE_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn malformed(part: &str, reason: impl Display) -> PackageError {
    PackageError::Malformed {
        part: part.to_string(),
        reason: reason.to_string(),
    }
}

fn write_err(part: &str, reason: impl Display) -> PackageError {
    PackageError::Write {
        part: part.to_string(),
        reason: reason.to_string(),
    }
}

fn archive_err(path: &Path, source: zip::result::ZipError) -> PackageError {
    PackageError::Archive {
        path: path.to_path_buf(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
