//! In-memory EPUB fixture builder for integration tests.

// Each integration test binary compiles its own copy; not every binary
// uses every helper.
#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Build a minimal EPUB 2 package in memory.
///
/// `chapters` are `(href, bytes)` pairs placed in the spine in order;
/// `toc` entries are `(title, src)` pairs emitted as flat NCX navPoints.
pub fn build_epub(
    title: Option<&str>,
    author: Option<&str>,
    chapters: &[(&str, &[u8])],
    toc: &[(&str, &str)],
) -> Vec<u8> {
    let opf = generate_opf(title, author, &chapter_hrefs(chapters));
    let ncx = generate_ncx(toc);

    let mut files: Vec<(String, Vec<u8>)> = vec![
        ("OEBPS/content.opf".to_string(), opf.into_bytes()),
        ("OEBPS/toc.ncx".to_string(), ncx.into_bytes()),
    ];
    for (href, content) in chapters {
        files.push((format!("OEBPS/{}", href), content.to_vec()));
    }

    build_package(&files)
}

/// Build an EPUB-shaped ZIP (mimetype + container.xml + the given files).
///
/// Lower-level escape hatch for tests that need a deliberately broken
/// package, e.g. an OPF that references files the archive never carries.
pub fn build_package(files: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut buffer);
        let stored =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        let deflated =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        zip.start_file("mimetype", stored).unwrap();
        zip.write_all(b"application/epub+zip").unwrap();

        zip.start_file("META-INF/container.xml", deflated).unwrap();
        zip.write_all(
            br#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#,
        )
        .unwrap();

        for (path, content) in files {
            zip.start_file(path, deflated).unwrap();
            zip.write_all(content).unwrap();
        }

        zip.finish().unwrap();
    }
    buffer.into_inner()
}

fn chapter_hrefs<'a>(chapters: &'a [(&'a str, &'a [u8])]) -> Vec<&'a str> {
    chapters.iter().map(|(href, _)| *href).collect()
}

pub fn generate_opf(title: Option<&str>, author: Option<&str>, chapters: &[&str]) -> String {
    let mut opf = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
"#,
    );
    if let Some(title) = title {
        opf.push_str(&format!("    <dc:title>{}</dc:title>\n", title));
    }
    if let Some(author) = author {
        opf.push_str(&format!("    <dc:creator>{}</dc:creator>\n", author));
    }
    opf.push_str("  </metadata>\n  <manifest>\n");
    opf.push_str(
        "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n",
    );
    for (index, href) in chapters.iter().enumerate() {
        opf.push_str(&format!(
            "    <item id=\"item{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
            index, href
        ));
    }
    opf.push_str("  </manifest>\n  <spine toc=\"ncx\">\n");
    for (index, _) in chapters.iter().enumerate() {
        opf.push_str(&format!("    <itemref idref=\"item{}\"/>\n", index));
    }
    opf.push_str("  </spine>\n</package>\n");
    opf
}

pub fn generate_ncx(toc: &[(&str, &str)]) -> String {
    let mut ncx = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <navMap>
"#,
    );
    for (index, (title, src)) in toc.iter().enumerate() {
        ncx.push_str(&format!(
            "    <navPoint id=\"nav{index}\">\n      <navLabel><text>{title}</text></navLabel>\n      <content src=\"{src}\"/>\n    </navPoint>\n",
        ));
    }
    ncx.push_str("  </navMap>\n</ncx>\n");
    ncx
}
