// crates/mtp-sim-aml/src/parser.rs

//! Variable extraction from AutomationML descriptors.
//!
//! Three strategies run over every document, and their results are appended to
//! the root in this order:
//! 1. any `Variable` element;
//! 2. `ExternalInterface` elements whose class path marks them as OPC UA items;
//! 3. every `Attribute` element that is not a direct child of such an item.
//!
//! The parser does not deduplicate. Leaves describing the same tag are
//! reconciled downstream by identity normalization.

use crate::document::{Element, parse_document};
use crate::error::AmlError;
use log::{debug, info};
use mtp_sim::{AccessLevel, DEFAULT_NAMESPACE, Node};
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use zip::ZipArchive;

/// Extensions parsed as a single XML document.
pub const DOCUMENT_EXTENSIONS: [&str; 2] = ["aml", "xml"];

/// Extensions opened as a zip container of documents.
pub const ARCHIVE_EXTENSIONS: [&str; 2] = ["mtp", "amlx"];

/// Class-path marker of an OPC UA item interface (matched case-insensitively).
pub const UA_ITEM_MARKER: &str = "OPCUAItem";

const ROOT_BROWSE_NAME: &str = "MTP";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Document,
    Archive,
}

/// Text after the last `.` of the final path component. Dot-files such as
/// `.aml` count as having an extension.
fn extension_of(file_name: &str) -> String {
    let Some(name) = Path::new(file_name).file_name() else {
        return String::new();
    };
    name.to_string_lossy()
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

fn format_of(file_name: &str) -> Result<Format, AmlError> {
    let extension = extension_of(file_name);
    if DOCUMENT_EXTENSIONS.contains(&extension.as_str()) {
        Ok(Format::Document)
    } else if ARCHIVE_EXTENSIONS.contains(&extension.as_str()) {
        Ok(Format::Archive)
    } else {
        Err(AmlError::UnsupportedFormat { extension })
    }
}

fn is_document_name(entry_name: &str) -> bool {
    let lower = entry_name.to_ascii_lowercase();
    DOCUMENT_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{ext}")))
}

/// Parses one descriptor document into a tree rooted at an `MTP` folder.
pub fn parse(xml: &str) -> Result<Node, AmlError> {
    let document = parse_document(xml)?;
    let mut root = Node::folder(ROOT_BROWSE_NAME);
    extract_variables(&document, &mut root.children);
    Ok(root)
}

/// Parses a descriptor file, choosing the mode from its extension.
///
/// The extension is checked before the file is opened.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Node, AmlError> {
    let path = path.as_ref();
    let file_name = path.to_string_lossy();
    let format = format_of(&file_name)?;
    let bytes = fs::read(path)?;
    info!("[Parser] Loading descriptor {}", path.display());
    parse_content(format, &file_name, &bytes)
}

/// Parses descriptor content already in memory, e.g. an upload.
/// `file_name` selects the mode exactly as [`parse_file`] does.
pub fn parse_bytes(file_name: &str, bytes: &[u8]) -> Result<Node, AmlError> {
    let format = format_of(file_name)?;
    parse_content(format, file_name, bytes)
}

fn parse_content(format: Format, file_name: &str, bytes: &[u8]) -> Result<Node, AmlError> {
    match format {
        Format::Document => parse(decode_text(bytes)?),
        Format::Archive => parse_archive(file_name, bytes),
    }
}

fn decode_text(bytes: &[u8]) -> Result<&str, AmlError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    std::str::from_utf8(bytes)
        .map_err(|e| AmlError::malformed(format!("document is not valid UTF-8: {}", e)))
}

/// Parses every document entry of an archive and flattens their variables into
/// one root. Any failing entry fails the whole archive.
fn parse_archive(file_name: &str, bytes: &[u8]) -> Result<Node, AmlError> {
    let display_name = Path::new(file_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let mut root = Node::folder(display_name).with_browse_name(ROOT_BROWSE_NAME);

    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut documents = 0;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() || !is_document_name(entry.name()) {
            continue;
        }
        let name = entry.name().to_string();

        let mut content = Vec::new();
        entry.read_to_end(&mut content).map_err(|e| {
            AmlError::malformed(format!("entry could not be read: {}", e)).in_entry(&name)
        })?;
        let sub = decode_text(&content)
            .and_then(parse)
            .map_err(|e| e.in_entry(&name))?;

        debug!(
            "[Parser] Entry '{}' contributed {} variable(s)",
            name,
            sub.children.len()
        );
        root.children.extend(sub.children);
        documents += 1;
    }

    info!(
        "[Parser] Archive '{}': {} document(s), {} variable(s)",
        root.display_name,
        documents,
        root.children.len()
    );
    Ok(root)
}

fn extract_variables(document: &Element, out: &mut Vec<Node>) {
    let start = out.len();
    generic_variables(document, out);
    let generic = out.len() - start;
    ua_items(document, out);
    let items = out.len() - start - generic;
    attribute_fallback(document, out);
    let attributes = out.len() - start - generic - items;

    debug!(
        "[Parser] Extracted {} generic variable(s), {} UA item(s), {} attribute(s)",
        generic, items, attributes
    );
}

// --- Strategy 1: generic Variable elements ---

fn generic_variables(document: &Element, out: &mut Vec<Node>) {
    for (_, element) in document.descendants() {
        if element.name != "Variable" {
            continue;
        }
        let name = element.attr("Name").unwrap_or("Unknown");
        let data_type = element.attr("DataType").unwrap_or("Double");
        let namespace = element
            .attr("NamespaceIndex")
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let node_id = element.attr("NodeId").unwrap_or(name);

        out.push(
            Node::variable(name, data_type).with_identifier(format!("ns={namespace};s={node_id}")),
        );
    }
}

// --- Strategy 2: OPC UA item interfaces ---

fn is_ua_item(element: &Element) -> bool {
    element.name == "ExternalInterface"
        && element.attr("RefBaseClassPath").is_some_and(|path| {
            path.to_ascii_lowercase()
                .contains(&UA_ITEM_MARKER.to_ascii_lowercase())
        })
}

/// `AttributeDataType`, else `DataType`.
fn declared_type(attribute: &Element) -> Option<&str> {
    attribute
        .attr("AttributeDataType")
        .or_else(|| attribute.attr("DataType"))
}

fn ua_items(document: &Element, out: &mut Vec<Node>) {
    for (_, element) in document.descendants() {
        if is_ua_item(element) {
            out.push(ua_item(element));
        }
    }
}

fn ua_item(interface: &Element) -> Node {
    let item_name = interface.attr("Name").unwrap_or("Item");
    let mut identifier: Option<String> = None;
    let mut data_type = String::from("xs:string");
    let mut access: Option<AccessLevel> = None;
    let mut description: Option<String> = None;

    for attribute in interface.children_named("Attribute") {
        let name = attribute.attr("Name").unwrap_or_default();
        let value = attribute.children_named("Value").next().map(Element::text);
        let filled = value.as_deref().map(str::trim).filter(|v| !v.is_empty());

        if name.eq_ignore_ascii_case("Identifier") {
            if let Some(v) = filled {
                identifier = Some(v.to_string());
                if let Some(declared) = declared_type(attribute).filter(|t| !t.trim().is_empty()) {
                    data_type = declared.to_string();
                }
            }
        } else if name.eq_ignore_ascii_case("Namespace") {
            // Identifiers stay bare; the address space qualifies them.
        } else if name.eq_ignore_ascii_case("DataType") {
            if let Some(v) = filled {
                data_type = v.to_string();
            }
        } else if name.eq_ignore_ascii_case("Access") {
            if let Some(v) = filled {
                access = AccessLevel::parse(v);
            }
        } else if name.eq_ignore_ascii_case("Description") {
            description = value;
        }
    }

    let identifier = identifier.unwrap_or_else(|| item_name.to_string());
    Node::variable(item_name, data_type)
        .with_identifier(identifier)
        .with_access(access)
        .with_description(description)
}

// --- Strategy 3: attribute fallback ---

fn attribute_fallback(document: &Element, out: &mut Vec<Node>) {
    for (parent, element) in document.descendants() {
        if element.name != "Attribute" || parent.is_some_and(is_ua_item) {
            continue;
        }
        let Some(name) = element.attr("Name").filter(|n| !n.trim().is_empty()) else {
            continue;
        };
        let data_type = declared_type(element).unwrap_or("Double");
        let id = name.replace(' ', "_");

        out.push(
            Node::variable(name, data_type)
                .with_identifier(format!("ns={};s=AML/{}", DEFAULT_NAMESPACE, id)),
        );
    }
}
