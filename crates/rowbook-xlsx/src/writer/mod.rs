//! Package writer
//!
//! Walks the registry-derived part paths, resolves every part that still
//! carries its placeholder, and hands the final content to the zip
//! collaborator. Shared strings are written last: resolving worksheets
//! interns cell text, and the pool must be complete before its part renders.

use std::fs::File;
use std::io::{Seek, Write};
use std::path::Path;

use log::debug;

use rowbook_core::{Part, Registry};

use crate::error::XlsxResult;
use crate::parts;

/// Package file writer
pub struct XlsxWriter;

impl XlsxWriter {
    /// Write a registry to a file path
    pub fn write_file<P: AsRef<Path>>(registry: &mut Registry, path: P) -> XlsxResult<()> {
        let file = File::create(path)?;
        Self::write(registry, file)
    }

    /// Write a registry to a writer
    pub fn write<W: Write + Seek>(registry: &mut Registry, writer: W) -> XlsxResult<()> {
        Self::sync_parts(registry);

        let mut zip = zip::ZipWriter::new(writer);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .compression_level(Some(9));

        let mut paths = registry.part_paths();
        paths.retain(|p| p != parts::SHARED_STRINGS);
        paths.push(parts::SHARED_STRINGS.to_string());

        for path in paths {
            let part = match registry.part(&path) {
                Some(part) => part.clone(),
                None => continue,
            };
            let bytes = match part {
                Part::Template(_) => {
                    debug!("resolving part {}", path);
                    parts::resolve(registry, &path)?.into_bytes()
                }
                Part::Text(text) => text.into_bytes(),
                Part::Raw(bytes) => bytes,
            };
            zip.start_file(&path, options)?;
            zip.write_all(&bytes)?;
        }

        zip.finish()?;
        Ok(())
    }

    // Every registered sheet and table must have its part templates in the
    // map before resolution starts; placement runs here so refs are final.
    fn sync_parts(registry: &mut Registry) {
        for sheet_id in registry.sheet_ids() {
            registry.place_tables(sheet_id);

            let target = registry.sheet(sheet_id).target().to_string();
            let table_ids = registry.sheet(sheet_id).tables().to_vec();

            // A preserved shell that predates the sheet's tables has no
            // tableParts list; it must be rebuilt from the fresh template.
            let ws_path = parts::part_path(&target);
            let needs_fresh = match registry.part(&ws_path) {
                None => true,
                Some(Part::Template(t)) => !table_ids.is_empty() && !t.contains("<tableParts"),
                Some(_) => false,
            };
            if needs_fresh {
                registry.set_part(ws_path, Part::Template(parts::WORKSHEET_TEMPLATE.into()));
            }

            if table_ids.is_empty() {
                continue;
            }
            let rels_path = parts::sheet_rels_path(&target);
            if !registry.has_part(&rels_path) {
                registry.set_part(rels_path, Part::Template(parts::SHEET_RELS_TEMPLATE.into()));
            }
            for tid in table_ids {
                let table_path = parts::part_path(registry.table(tid).target());
                if !registry.has_part(&table_path) {
                    registry.set_part(table_path, Part::Template(parts::TABLE_TEMPLATE.into()));
                }
            }
        }
    }
}
