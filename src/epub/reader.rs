use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;
use zip::ZipArchive;

use crate::book::{Book, Metadata, TocEntry};
use crate::error::{Error, Result};

/// Parsed OPF content.
struct OpfData {
    metadata: Metadata,
    /// Maps manifest id -> (href, media_type).
    manifest: HashMap<String, (String, String)>,
    spine_ids: Vec<String>,
    /// NCX document href (EPUB 2 table of contents).
    ncx_href: Option<String>,
    /// Nav document href (EPUB 3 table of contents).
    nav_href: Option<String>,
}

/// Read an EPUB file from disk into a [`Book`].
///
/// Supports EPUB 2 and EPUB 3. Extracts title/author metadata, the spine's
/// content documents, and the table of contents (NCX, with the EPUB 3 nav
/// document as fallback).
///
/// # Example
///
/// ```no_run
/// use epubdown::read_epub;
///
/// let book = read_epub("path/to/book.epub")?;
/// println!("Title: {}", book.metadata.title);
/// # Ok::<(), epubdown::Error>(())
/// ```
pub fn read_epub<P: AsRef<Path>>(path: P) -> Result<Book> {
    let file = std::fs::File::open(path)?;
    read_epub_from_reader(file)
}

/// Read an EPUB from any [`Read`] + [`Seek`] source, such as an in-memory
/// buffer of an uploaded file.
pub fn read_epub_from_reader<R: Read + Seek>(reader: R) -> Result<Book> {
    let mut archive = ZipArchive::new(reader)?;

    let opf_path = find_opf_path(&mut archive)?;
    let opf_dir = Path::new(&opf_path)
        .parent()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default();

    let opf_content = read_archive_file(&mut archive, &opf_path)?;
    let OpfData {
        metadata,
        manifest,
        spine_ids,
        ncx_href,
        nav_href,
    } = parse_opf(&opf_content)?;

    let mut book = Book::new();
    book.metadata = metadata;

    // Load spine content documents in reading order. An unreadable entry
    // is skipped with a warning; one broken chapter must not abort the book.
    for id in spine_ids {
        let Some((href, media_type)) = manifest.get(&id) else {
            tracing::warn!(idref = %id, "spine references an unknown manifest item");
            continue;
        };
        let full_path = resolve_path(&opf_dir, href);
        match read_archive_file_bytes(&mut archive, &full_path) {
            Ok(data) => {
                book.add_resource(href.clone(), data, media_type.clone());
                book.add_spine_item(&id, href.clone(), media_type.clone());
            }
            Err(e) => {
                tracing::warn!(href = %href, error = %e, "skipping unreadable spine item");
            }
        }
    }

    // Table of contents: NCX first, EPUB 3 nav document as fallback.
    if let Some(ncx_href) = ncx_href
        && let Ok(ncx_content) =
            read_archive_file(&mut archive, &resolve_path(&opf_dir, &ncx_href))
    {
        book.toc = parse_ncx(&ncx_content)?;
    }
    if book.toc.is_empty()
        && let Some(nav_href) = nav_href
        && let Ok(nav_content) =
            read_archive_file(&mut archive, &resolve_path(&opf_dir, &nav_href))
    {
        book.toc = parse_nav(&nav_content);
    }

    Ok(book)
}

fn find_opf_path<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    let container = read_archive_file(archive, "META-INF/container.xml")?;

    let mut reader = Reader::from_str(&container);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"rootfile" => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"full-path" {
                        return Ok(String::from_utf8(attr.value.to_vec())?);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Err(Error::InvalidEpub(
        "No rootfile found in container.xml".into(),
    ))
}

fn parse_opf(content: &str) -> Result<OpfData> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut title: Option<String> = None;
    let mut author: Option<String> = None;
    let mut manifest: HashMap<String, (String, String)> = HashMap::new();
    let mut spine_ids: Vec<String> = Vec::new();
    let mut toc_id: Option<String> = None;
    let mut nav_href: Option<String> = None;

    let mut in_metadata = false;
    let mut current_element: Option<&'static str> = None;
    let mut buf_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match local_name(e.name().as_ref()) {
                b"metadata" => in_metadata = true,
                b"title" if in_metadata => {
                    current_element = Some("title");
                    buf_text.clear();
                }
                b"creator" if in_metadata => {
                    current_element = Some("creator");
                    buf_text.clear();
                }
                b"spine" => {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"toc" {
                            toc_id = Some(String::from_utf8(attr.value.to_vec())?);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => match local_name(e.name().as_ref()) {
                b"item" => {
                    let mut id = String::new();
                    let mut href = String::new();
                    let mut media_type = String::new();
                    let mut is_nav = false;

                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"id" => id = String::from_utf8(attr.value.to_vec())?,
                            b"href" => href = String::from_utf8(attr.value.to_vec())?,
                            b"media-type" => {
                                media_type = String::from_utf8(attr.value.to_vec())?
                            }
                            b"properties" => {
                                let props = String::from_utf8(attr.value.to_vec())?;
                                is_nav = props.split_ascii_whitespace().any(|p| p == "nav");
                            }
                            _ => {}
                        }
                    }

                    if is_nav {
                        nav_href = Some(href.clone());
                    }
                    if !id.is_empty() {
                        manifest.insert(id, (href, media_type));
                    }
                }
                b"itemref" => {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"idref" {
                            spine_ids.push(String::from_utf8(attr.value.to_vec())?);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if current_element.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if current_element.is_some() {
                    buf_text.push_str(resolve_entity(&String::from_utf8_lossy(e.as_ref())));
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                if local == b"metadata" {
                    in_metadata = false;
                }
                match current_element.take() {
                    Some("title") if title.is_none() && !buf_text.is_empty() => {
                        title = Some(buf_text.clone());
                    }
                    Some("creator") if author.is_none() && !buf_text.is_empty() => {
                        author = Some(buf_text.clone());
                    }
                    _ => {}
                }
                buf_text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    let mut metadata = Metadata::default();
    if let Some(title) = title {
        metadata.title = title;
    }
    if let Some(author) = author {
        metadata.author = author;
    }

    // Resolve the NCX href from the spine's toc attribute.
    let ncx_href = toc_id
        .and_then(|id| manifest.get(&id))
        .map(|(href, _)| href.clone());

    Ok(OpfData {
        metadata,
        manifest,
        spine_ids,
        ncx_href,
        nav_href,
    })
}

fn parse_ncx(content: &str) -> Result<Vec<TocEntry>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    // One frame per open navPoint.
    struct NavPointState {
        children: Vec<TocEntry>,
        text: Option<String>,
        src: Option<String>,
    }

    let mut stack: Vec<NavPointState> = vec![NavPointState {
        children: Vec::new(),
        text: None,
        src: None,
    }];
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match local_name(e.name().as_ref()) {
                b"navPoint" => stack.push(NavPointState {
                    children: Vec::new(),
                    text: None,
                    src: None,
                }),
                b"text" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if local_name(e.name().as_ref()) == b"content" {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"src"
                            && let Some(state) = stack.last_mut()
                        {
                            state.src = Some(String::from_utf8(attr.value.to_vec())?);
                        }
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if in_text && let Some(state) = stack.last_mut() {
                    let raw = String::from_utf8_lossy(e.as_ref());
                    state.text.get_or_insert_default().push_str(&raw);
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if in_text && let Some(state) = stack.last_mut() {
                    let resolved = resolve_entity(&String::from_utf8_lossy(e.as_ref()));
                    state.text.get_or_insert_default().push_str(resolved);
                }
            }
            Ok(Event::End(e)) => match local_name(e.name().as_ref()) {
                b"text" => in_text = false,
                b"navPoint" => {
                    if let Some(state) = stack.pop()
                        && let (Some(text), Some(src)) = (state.text, state.src)
                    {
                        let mut entry = TocEntry::new(text, src);
                        entry.children = state.children;
                        if let Some(parent) = stack.last_mut() {
                            parent.children.push(entry);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Ok(stack.pop().map(|s| s.children).unwrap_or_default())
}

/// Parse an EPUB 3 nav document's `<nav epub:type="toc">` list.
///
/// Nav documents are XHTML, so the well-formed XML reader applies. The
/// nested `<ol>`/`<li>`/`<a>` structure maps directly onto [`TocEntry`]
/// nesting. Parse failures yield an empty (or truncated) table of
/// contents rather than an error; the TOC is only a title fallback.
fn parse_nav(content: &str) -> Vec<TocEntry> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut in_toc_nav = false;
    let mut nav_depth = 0usize;
    // Stack of sibling lists; one frame per open <ol>.
    let mut lists: Vec<Vec<TocEntry>> = Vec::new();
    let mut done: Vec<TocEntry> = Vec::new();
    let mut link_href: Option<String> = None;
    let mut link_text = String::new();
    let mut in_link = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match local_name(e.name().as_ref()) {
                b"nav" => {
                    nav_depth += 1;
                    if !in_toc_nav && nav_type_is_toc(&e) {
                        in_toc_nav = true;
                    }
                }
                b"ol" if in_toc_nav => lists.push(Vec::new()),
                b"a" if in_toc_nav && !lists.is_empty() => {
                    in_link = true;
                    link_text.clear();
                    link_href = e.attributes().flatten().find_map(|attr| {
                        (attr.key.as_ref() == b"href")
                            .then(|| String::from_utf8_lossy(&attr.value).into_owned())
                    });
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_link {
                    link_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if in_link {
                    link_text.push_str(resolve_entity(&String::from_utf8_lossy(e.as_ref())));
                }
            }
            Ok(Event::End(e)) => match local_name(e.name().as_ref()) {
                b"nav" => {
                    nav_depth = nav_depth.saturating_sub(1);
                    if nav_depth == 0 {
                        in_toc_nav = false;
                    }
                }
                b"a" if in_link => {
                    in_link = false;
                    let text = link_text.trim();
                    if let (Some(href), false) = (link_href.take(), text.is_empty())
                        && let Some(list) = lists.last_mut()
                    {
                        list.push(TocEntry::new(text, href));
                    }
                }
                b"ol" if in_toc_nav => {
                    if let Some(children) = lists.pop() {
                        match lists.last_mut() {
                            // Nested list: attach to the entry whose <li> contains it.
                            Some(parent) if parent.last().is_some() => {
                                parent.last_mut().unwrap().children = children;
                            }
                            _ => done.extend(children),
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }

    done
}

fn nav_type_is_toc(e: &quick_xml::events::BytesStart<'_>) -> bool {
    e.attributes().flatten().any(|attr| {
        local_name(attr.key.as_ref()) == b"type" && attr.value.as_ref() == b"toc"
    })
}

fn resolve_entity(entity: &str) -> &'static str {
    match entity {
        "apos" => "'",
        "quot" => "\"",
        "lt" => "<",
        "gt" => ">",
        "amp" => "&",
        _ => "",
    }
}

fn read_archive_file<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String> {
    let bytes = read_archive_file_bytes(archive, path)?;
    let bytes = strip_bom(&bytes);
    Ok(String::from_utf8(bytes.to_vec())?)
}

fn read_archive_file_bytes<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<Vec<u8>> {
    // Try direct lookup first
    match archive.by_name(path) {
        Ok(mut file) => {
            let mut contents = Vec::new();
            file.read_to_end(&mut contents)?;
            return Ok(contents);
        }
        Err(zip::result::ZipError::FileNotFound) => {}
        Err(e) => return Err(e.into()),
    }

    // Fallback: try percent-decoded path (handles malformed EPUBs)
    let decoded = percent_encoding::percent_decode_str(path)
        .decode_utf8()
        .map_err(|_| Error::InvalidEpub(format!("Invalid UTF-8 in path: {}", path)))?;

    let mut file = archive.by_name(&decoded)?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;
    Ok(contents)
}

/// Strip a UTF-8 BOM if present.
fn strip_bom(data: &[u8]) -> &[u8] {
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    }
}

fn resolve_path(base: &str, href: &str) -> String {
    if base.is_empty() {
        href.to_string()
    } else {
        format!("{}/{}", base, href)
    }
}

/// Extract the local name from a potentially namespaced XML name.
fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}
