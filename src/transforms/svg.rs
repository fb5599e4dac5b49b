//! SVG cleanup and sprite building with `quick-xml`.

use super::{OnError, Step, StepError, StepOutput};
use crate::build::FileRecord;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::path::PathBuf;

const SVG_NS: &str = "http://www.w3.org/2000/svg";

/// Prefixes written by vector editors that browsers ignore.
const EDITOR_PREFIXES: &[&[u8]] = &[b"inkscape", b"sodipodi", b"sketch"];

/// Elements that carry no rendering information.
const DROPPED_ELEMENTS: &[&[u8]] = &[b"metadata", b"title", b"desc"];

fn is_editor_name(name: &[u8]) -> bool {
    EDITOR_PREFIXES
        .iter()
        .any(|prefix| name.len() > prefix.len() && name.starts_with(prefix) && name[prefix.len()] == b':')
}

fn is_editor_xmlns(key: &[u8]) -> bool {
    key.strip_prefix(b"xmlns:").is_some_and(|prefix| EDITOR_PREFIXES.contains(&prefix))
}

fn is_dropped_element(name: &[u8]) -> bool {
    DROPPED_ELEMENTS.contains(&name) || is_editor_name(name)
}

/// Copy an element start tag without editor attributes.
fn clean_start(start: &BytesStart<'_>) -> Result<BytesStart<'static>, String> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut cleaned = BytesStart::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = attr.key.as_ref();
        if is_editor_name(key) || is_editor_xmlns(key) {
            continue;
        }
        cleaned.push_attribute((key, attr.value.as_ref()));
    }
    Ok(cleaned)
}

/// Stream through an SVG document, dropping what [`OptimizeSvg`] removes.
///
/// `on_root` sees the document element once; every other kept event goes to
/// `emit` along with its nesting depth below the root.
fn walk_svg<'a>(
    source: &'a str,
    mut on_root: impl FnMut(&BytesStart<'a>),
    mut emit: impl FnMut(Event<'static>, usize) -> Result<(), String>,
) -> Result<(), String> {
    let mut reader = Reader::from_str(source);
    reader.config_mut().trim_text(true);

    let mut depth = 0usize;
    let mut skip_depth = 0usize;
    let mut seen_root = false;

    loop {
        let event = reader.read_event().map_err(|e| e.to_string())?;
        match event {
            Event::Eof => break,
            Event::Decl(_) | Event::Comment(_) | Event::DocType(_) | Event::PI(_) => {}
            Event::Start(start) => {
                if skip_depth > 0 {
                    skip_depth += 1;
                } else if is_dropped_element(start.name().as_ref()) {
                    skip_depth = 1;
                } else {
                    if !seen_root {
                        seen_root = true;
                        on_root(&start);
                    }
                    emit(Event::Start(clean_start(&start)?), depth)?;
                    depth += 1;
                }
            }
            Event::Empty(start) => {
                if skip_depth > 0 || is_dropped_element(start.name().as_ref()) {
                    continue;
                }
                if !seen_root {
                    seen_root = true;
                    on_root(&start);
                }
                emit(Event::Empty(clean_start(&start)?), depth)?;
            }
            Event::End(end) => {
                if skip_depth > 0 {
                    skip_depth -= 1;
                } else {
                    depth = depth.saturating_sub(1);
                    let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                    emit(Event::End(BytesEnd::new(name)), depth)?;
                }
            }
            other if skip_depth == 0 => emit(other.into_owned(), depth)?,
            _ => {}
        }
    }

    if seen_root {
        Ok(())
    } else {
        Err("no root element".to_string())
    }
}

/// Remove editor metadata, comments and prologue from SVG files.
#[derive(Debug, Clone, Default)]
pub struct OptimizeSvg;

impl OptimizeSvg {
    /// Create the step.
    pub fn new() -> Self {
        Self
    }
}

impl Step for OptimizeSvg {
    fn name(&self) -> &'static str {
        "svgmin"
    }

    fn apply(&self, mut record: FileRecord) -> Result<Option<FileRecord>, StepError> {
        let source = record.text().map_err(|e| StepError::new(self.name(), &record, e))?;
        let mut writer = Writer::new(Vec::with_capacity(source.len()));

        walk_svg(source, |_| {}, |event, _| writer.write_event(event).map_err(|e| e.to_string()))
            .map_err(|e| StepError::new(self.name(), &record, e))?;

        record.contents = writer.into_inner();
        Ok(Some(record))
    }
}

/// Combine icons into one SVG of `<symbol>` elements.
///
/// Symbols are ordered by file name and use the file stem as `id`. The
/// output is named after the icons' base directory.
#[derive(Debug, Clone, Default)]
pub struct SvgStore;

impl SvgStore {
    /// Create the step.
    pub fn new() -> Self {
        Self
    }

    fn symbol(&self, record: &FileRecord) -> Result<Vec<u8>, StepError> {
        let id = record
            .file_stem()
            .ok_or_else(|| StepError::new(self.name(), record, "icon has no file name"))?
            .to_string();
        let source = record.text().map_err(|e| StepError::new(self.name(), record, e))?;

        let mut symbol = BytesStart::new("symbol");
        symbol.push_attribute(("id", id.as_str()));
        let mut children = Writer::new(Vec::new());

        walk_svg(
            source,
            |root| {
                for attr in root.attributes().flatten() {
                    let key = attr.key.as_ref();
                    if key == b"viewBox" || key == b"preserveAspectRatio" {
                        symbol.push_attribute((key, attr.value.as_ref()));
                    }
                }
            },
            |event, depth| {
                // The icon's own <svg> element is replaced by the symbol
                if depth == 0 {
                    return Ok(());
                }
                children.write_event(event).map_err(|e| e.to_string())
            },
        )
        .map_err(|e| StepError::new(self.name(), record, e))?;

        let mut out = Writer::new(Vec::new());
        let body = children.into_inner();
        let written = if body.is_empty() {
            out.write_event(Event::Empty(symbol))
        } else {
            out.write_event(Event::Start(symbol)).and_then(|_| {
                out.get_mut().extend_from_slice(&body);
                out.write_event(Event::End(BytesEnd::new("symbol")))
            })
        };
        written.map_err(|e| StepError::new(self.name(), record, e))?;
        Ok(out.into_inner())
    }
}

impl Step for SvgStore {
    fn name(&self) -> &'static str {
        "svgstore"
    }

    fn apply(&self, record: FileRecord) -> Result<Option<FileRecord>, StepError> {
        let mut output = self.apply_all(vec![record], OnError::Fail)?;
        Ok(output.records.pop())
    }

    fn apply_all(&self, mut records: Vec<FileRecord>, on_error: OnError) -> Result<StepOutput, StepError> {
        let mut output = StepOutput::default();
        let Some(first) = records.first() else {
            return Ok(output);
        };

        let base = first.base.clone();
        let file_name = base
            .file_name()
            .map(|n| format!("{}.svg", n.to_string_lossy()))
            .unwrap_or_else(|| "sprite.svg".to_string());

        records.sort_by(|a, b| a.relative.cmp(&b.relative));

        let mut combined = format!("<svg xmlns=\"{}\">", SVG_NS).into_bytes();
        let mut symbols = 0usize;
        for record in &records {
            match self.symbol(record) {
                Ok(symbol) => {
                    combined.extend_from_slice(&symbol);
                    symbols += 1;
                }
                Err(e) if on_error == OnError::Skip => {
                    tracing::error!(step = self.name(), file = %e.file.display(), "{}", e.message);
                    output.skipped.push(e);
                }
                Err(e) => return Err(e),
            }
        }
        combined.extend_from_slice(b"</svg>");

        tracing::debug!(symbols, file = %file_name, "built sprite");
        let mut sprite = FileRecord::new(base.clone(), PathBuf::from(&file_name), combined);
        sprite.source = base;
        output.records.push(sprite);
        Ok(output)
    }
}
