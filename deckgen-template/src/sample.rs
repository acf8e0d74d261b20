//! Minimal starter deck, written by `deckgen init --sample`.
//!
//! Produces the smallest OOXML presentation PowerPoint and LibreOffice both
//! accept: one master, one blank layout, one theme, and one slide per
//! [`SampleSlide`], each slide holding a single text box with one paragraph
//! per line.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::PackageError;

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;
const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_TYPE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const CT_PML: &str = "application/vnd.openxmlformats-officedocument.presentationml";
const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const EMPTY_TREE: &str = r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>"#;

/// One slide of the starter deck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleSlide {
    pub lines: Vec<String>,
}

impl SampleSlide {
    pub fn new(lines: Vec<String>) -> Self {
        SampleSlide { lines }
    }
}

/// Slides of the starter deck, using the default placeholder tokens.
pub fn default_slides() -> Vec<SampleSlide> {
    vec![
        SampleSlide::new(vec![
            "Certificate".to_string(),
            "Awarded to [[VOTRE_BALISE]]".to_string(),
        ]),
        SampleSlide::new(vec!["Topic: [[SUJET]]".to_string()]),
    ]
}

/// Build a `.pptx` archive holding `slides`.
pub fn sample_deck(slides: &[SampleSlide]) -> Result<Vec<u8>, PackageError> {
    let mut parts: Vec<(String, String)> = vec![
        ("[Content_Types].xml".into(), content_types(slides.len())),
        (
            "_rels/.rels".into(),
            rels(&[("officeDocument", "ppt/presentation.xml")]),
        ),
        ("ppt/presentation.xml".into(), presentation(slides.len())),
        (
            "ppt/_rels/presentation.xml.rels".into(),
            presentation_rels(slides.len()),
        ),
        ("ppt/slideMasters/slideMaster1.xml".into(), master()),
        (
            "ppt/slideMasters/_rels/slideMaster1.xml.rels".into(),
            rels(&[
                ("slideLayout", "../slideLayouts/slideLayout1.xml"),
                ("theme", "../theme/theme1.xml"),
            ]),
        ),
        ("ppt/slideLayouts/slideLayout1.xml".into(), layout()),
        (
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels".into(),
            rels(&[("slideMaster", "../slideMasters/slideMaster1.xml")]),
        ),
        ("ppt/theme/theme1.xml".into(), theme()),
    ];
    for (i, slide) in slides.iter().enumerate() {
        let n = i + 1;
        parts.push((format!("ppt/slides/slide{n}.xml"), slide_xml(slide)));
        parts.push((
            format!("ppt/slides/_rels/slide{n}.xml.rels"),
            rels(&[("slideLayout", "../slideLayouts/slideLayout1.xml")]),
        ));
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, body) in &parts {
        zip.start_file(name.as_str(), options)
            .map_err(|e| write_err(name, e))?;
        zip.write_all(body.as_bytes())
            .map_err(|e| write_err(name, e))?;
    }
    let cursor = zip.finish().map_err(|e| write_err("archive", e))?;
    Ok(cursor.into_inner())
}

fn write_err(part: &str, reason: impl std::fmt::Display) -> PackageError {
    PackageError::Write {
        part: part.to_string(),
        reason: reason.to_string(),
    }
}

fn escape(text: &str) -> String {
    quick_xml::escape::escape(text).into_owned()
}

fn rels(targets: &[(&str, &str)]) -> String {
    let body: String = targets
        .iter()
        .enumerate()
        .map(|(i, (kind, target))| {
            format!(
                r#"<Relationship Id="rId{}" Type="{REL_TYPE}/{kind}" Target="{target}"/>"#,
                i + 1
            )
        })
        .collect();
    format!(r#"{XML_DECL}<Relationships xmlns="{REL_NS}">{body}</Relationships>"#)
}

fn content_types(slide_count: usize) -> String {
    let mut overrides = vec![
        ("/ppt/presentation.xml".to_string(), format!("{CT_PML}.presentation.main+xml")),
        ("/ppt/slideMasters/slideMaster1.xml".to_string(), format!("{CT_PML}.slideMaster+xml")),
        ("/ppt/slideLayouts/slideLayout1.xml".to_string(), format!("{CT_PML}.slideLayout+xml")),
        (
            "/ppt/theme/theme1.xml".to_string(),
            "application/vnd.openxmlformats-officedocument.theme+xml".to_string(),
        ),
    ];
    for n in 1..=slide_count {
        overrides.push((format!("/ppt/slides/slide{n}.xml"), format!("{CT_PML}.slide+xml")));
    }
    let overrides: String = overrides
        .iter()
        .map(|(part, ct)| format!(r#"<Override PartName="{part}" ContentType="{ct}"/>"#))
        .collect();
    format!(
        r#"{XML_DECL}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/>{overrides}</Types>"#
    )
}

/// rId1 is the master, rId2 the theme, slides start at rId3.
fn presentation(slide_count: usize) -> String {
    let ids: String = (1..=slide_count)
        .map(|n| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 255 + n, n + 2))
        .collect();
    format!(
        r#"{XML_DECL}<p:presentation {NS}><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst>{ids}</p:sldIdLst><p:sldSz cx="9144000" cy="6858000"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#
    )
}

fn presentation_rels(slide_count: usize) -> String {
    let mut targets = vec![
        ("slideMaster", "slideMasters/slideMaster1.xml".to_string()),
        ("theme", "theme/theme1.xml".to_string()),
    ];
    for n in 1..=slide_count {
        targets.push(("slide", format!("slides/slide{n}.xml")));
    }
    let borrowed: Vec<(&str, &str)> = targets.iter().map(|(k, t)| (*k, t.as_str())).collect();
    rels(&borrowed)
}

fn master() -> String {
    format!(
        r#"{XML_DECL}<p:sldMaster {NS}><p:cSld><p:spTree>{EMPTY_TREE}</p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst></p:sldMaster>"#
    )
}

fn layout() -> String {
    format!(
        r#"{XML_DECL}<p:sldLayout {NS} type="blank"><p:cSld><p:spTree>{EMPTY_TREE}</p:spTree></p:cSld></p:sldLayout>"#
    )
}

fn theme() -> String {
    let colors: String = [
        ("dk1", "000000"),
        ("lt1", "FFFFFF"),
        ("dk2", "1F2A44"),
        ("lt2", "EEECE1"),
        ("accent1", "4472C4"),
        ("accent2", "ED7D31"),
        ("accent3", "A5A5A5"),
        ("accent4", "FFC000"),
        ("accent5", "5B9BD5"),
        ("accent6", "70AD47"),
        ("hlink", "0563C1"),
        ("folHlink", "954F72"),
    ]
    .iter()
    .map(|(slot, rgb)| format!(r#"<a:{slot}><a:srgbClr val="{rgb}"/></a:{slot}>"#))
    .collect();
    let fill = r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#;
    let line = format!(r#"<a:ln w="6350">{fill}</a:ln>"#);
    let effect = "<a:effectStyle><a:effectLst/></a:effectStyle>";
    format!(
        r#"{XML_DECL}<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="deckgen"><a:themeElements><a:clrScheme name="deckgen">{colors}</a:clrScheme><a:fontScheme name="deckgen"><a:majorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont><a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme><a:fmtScheme name="deckgen"><a:fillStyleLst>{f}</a:fillStyleLst><a:lnStyleLst>{l}</a:lnStyleLst><a:effectStyleLst>{e}</a:effectStyleLst><a:bgFillStyleLst>{f}</a:bgFillStyleLst></a:fmtScheme></a:themeElements></a:theme>"#,
        f = fill.repeat(3),
        l = line.repeat(3),
        e = effect.repeat(3),
    )
}

fn slide_xml(slide: &SampleSlide) -> String {
    let paragraphs: String = if slide.lines.is_empty() {
        r#"<a:p><a:endParaRPr lang="en-US"/></a:p>"#.to_string()
    } else {
        slide
            .lines
            .iter()
            .map(|line| {
                format!(
                    r#"<a:p><a:r><a:rPr lang="en-US" sz="2400" dirty="0"/><a:t>{}</a:t></a:r></a:p>"#,
                    escape(line)
                )
            })
            .collect()
    };
    format!(
        r#"{XML_DECL}<p:sld {NS}><p:cSld><p:spTree>{EMPTY_TREE}<p:sp><p:nvSpPr><p:cNvPr id="2" name="Body"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="457200" y="457200"/><a:ext cx="8229600" cy="5943600"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr><p:txBody><a:bodyPr/><a:lstStyle/>{paragraphs}</p:txBody></p:sp></p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
    )
}
