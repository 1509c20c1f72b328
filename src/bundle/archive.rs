//! ZIP codec for unified bundles.
//!
//! Layout: `manifest.json` at the root, one blob per evidence record under
//! `files/<evidence-id>`. The manifest's `files` index carries the original
//! filename, size and SHA-256 of every blob.

use std::collections::HashSet;
use std::io::{Cursor, Read, Write};

use uuid::Uuid;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipArchive, ZipWriter};

use super::manifest::{
    blob_path, file_index, sha256_hex, EvidenceFile, EvidenceFiles, Manifest, FILES_DIR,
    FORMAT_VERSION, MANIFEST_PATH,
};
use crate::error::{Error, Result};

/// Largest manifest accepted from an archive once decompressed.
const MAX_MANIFEST_BYTES: u64 = 256 * 1024 * 1024;

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644)
}

/// Packs a manifest and its file table into ZIP bytes. Equal input gives equal output.
pub fn pack(manifest: &Manifest, files: &EvidenceFiles) -> Result<Vec<u8>> {
    if manifest.files != file_index(files) {
        return Err(Error::Internal(
            "manifest file index does not match the file table".to_string(),
        ));
    }

    let manifest_json = serde_json::to_vec_pretty(manifest)?;
    let options = entry_options();
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut zip = ZipWriter::new(&mut cursor);
        zip.start_file(MANIFEST_PATH, options)?;
        zip.write_all(&manifest_json)?;

        for (evidence_id, file) in files {
            zip.start_file(blob_path(*evidence_id), options)?;
            zip.write_all(&file.content)?;
        }
        zip.finish()?;
    }

    Ok(cursor.into_inner())
}

/// Reads a bundle back. Any inconsistency is a [`Error::CorruptArchive`].
pub fn unpack(bytes: &[u8]) -> Result<(Manifest, EvidenceFiles)> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::corrupt(format!("unreadable archive: {}", e)))?;

    let manifest = parse_manifest(&read_entry(&mut archive, MANIFEST_PATH, MAX_MANIFEST_BYTES)?)?;

    let evidence_ids: HashSet<Uuid> = manifest.records.evidence.iter().map(|e| e.id).collect();
    let mut files = EvidenceFiles::new();
    for entry in &manifest.files {
        if !evidence_ids.contains(&entry.evidence_id) {
            return Err(Error::corrupt(format!(
                "file entry {} has no evidence record",
                entry.evidence_id
            )));
        }

        let content = read_entry(&mut archive, &blob_path(entry.evidence_id), entry.size)?;
        if content.len() as u64 != entry.size {
            return Err(Error::corrupt(format!(
                "file {} is {} bytes, manifest says {}",
                entry.evidence_id,
                content.len(),
                entry.size
            )));
        }
        if sha256_hex(&content) != entry.sha256 {
            return Err(Error::corrupt(format!(
                "checksum mismatch for file {}",
                entry.evidence_id
            )));
        }

        let file = EvidenceFile::new(entry.original_filename.clone(), content);
        if files.insert(entry.evidence_id, file).is_some() {
            return Err(Error::corrupt(format!(
                "file {} is listed twice",
                entry.evidence_id
            )));
        }
    }

    let prefix = format!("{}/", FILES_DIR);
    for name in archive.file_names() {
        let Some(rest) = name.strip_prefix(&prefix) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        let known = Uuid::parse_str(rest)
            .map(|id| files.contains_key(&id))
            .unwrap_or(false);
        if !known {
            return Err(Error::corrupt(format!("unexpected archive entry {}", name)));
        }
    }

    Ok((manifest, files))
}

/// Parses a bare JSON manifest (the database-only bundle form).
pub fn parse_manifest(bytes: &[u8]) -> Result<Manifest> {
    let manifest: Manifest = serde_json::from_slice(bytes)
        .map_err(|e| Error::corrupt(format!("unreadable manifest: {}", e)))?;
    if manifest.format_version != FORMAT_VERSION {
        return Err(Error::corrupt(format!(
            "unsupported manifest version {}",
            manifest.format_version
        )));
    }
    Ok(manifest)
}

/// Decompresses one entry, refusing to inflate past `limit` bytes.
fn read_entry<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
    limit: u64,
) -> Result<Vec<u8>> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| Error::corrupt(format!("archive missing {}: {}", path, e)))?;
    if file.size() > limit {
        return Err(Error::corrupt(format!(
            "{} inflates to {} bytes, over the {} byte limit",
            path,
            file.size(),
            limit
        )));
    }
    let mut buffer = Vec::new();
    file.by_ref()
        .take(limit + 1)
        .read_to_end(&mut buffer)
        .map_err(|e| Error::corrupt(format!("failed to read {}: {}", path, e)))?;
    if buffer.len() as u64 > limit {
        return Err(Error::corrupt(format!(
            "{} inflates past the {} byte limit",
            path, limit
        )));
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::manifest::{ExportScope, Snapshot};
    use crate::models::evidence::{Evidence, EvidenceType};
    use crate::models::organization::{Organization, OrganizationType};
    use chrono::{TimeZone, Utc};

    fn evidence(id: Uuid, filename: &str) -> Evidence {
        Evidence {
            id,
            title: format!("Evidence {}", filename),
            description: Some("signed copy".into()),
            evidence_type: EvidenceType::Document,
            file_path: Some(format!("evidence/{}/{}", id, filename)),
            original_filename: Some(filename.into()),
            compliance_item_id: None,
            billable_event_id: None,
            contract_id: None,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    fn bundle() -> (Manifest, EvidenceFiles) {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut records = Snapshot::default();
        records.organizations.push(Organization {
            id: Uuid::new_v4(),
            name: "Acme".into(),
            code: "ACME".into(),
            org_type: OrganizationType::Customer,
            contact_email: Some("ops@acme.test".into()),
            is_active: true,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        });
        records.evidence.push(evidence(a, "report.pdf"));
        records.evidence.push(evidence(b, "report.pdf"));

        let mut files = EvidenceFiles::new();
        files.insert(a, EvidenceFile::new("report.pdf", b"%PDF-1.7 first".to_vec()));
        files.insert(b, EvidenceFile::new("report.pdf", vec![0, 159, 146, 150, 255]));

        let mut manifest = Manifest::new(
            ExportScope::Unified,
            Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap(),
            records,
        );
        manifest.files = file_index(&files);
        (manifest, files)
    }

    #[test]
    fn unpack_reverses_pack() {
        let (manifest, files) = bundle();
        let bytes = pack(&manifest, &files).unwrap();
        let (decoded_manifest, decoded_files) = unpack(&bytes).unwrap();
        assert_eq!(decoded_manifest, manifest);
        assert_eq!(decoded_files, files);
    }

    #[test]
    fn pack_is_deterministic() {
        let (manifest, files) = bundle();
        assert_eq!(pack(&manifest, &files).unwrap(), pack(&manifest, &files).unwrap());
    }

    #[test]
    fn blobs_are_keyed_by_evidence_id() {
        let (manifest, files) = bundle();
        let bytes = pack(&manifest, &files).unwrap();
        let archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort();
        let mut expected = vec![MANIFEST_PATH.to_string()];
        expected.extend(files.keys().map(|id| blob_path(*id)));
        expected.sort();
        assert_eq!(names, expected);
    }

    #[test]
    fn pack_rejects_stale_file_index() {
        let (mut manifest, files) = bundle();
        manifest.files.pop();
        assert!(matches!(pack(&manifest, &files), Err(Error::Internal(_))));
    }

    #[test]
    fn truncated_archive_is_corrupt() {
        let (manifest, files) = bundle();
        let bytes = pack(&manifest, &files).unwrap();
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(unpack(truncated), Err(Error::CorruptArchive(_))));
    }

    #[test]
    fn missing_manifest_is_corrupt() {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut cursor);
            zip.start_file("files/readme.txt", entry_options()).unwrap();
            zip.write_all(b"hello").unwrap();
            zip.finish().unwrap();
        }
        let err = unpack(&cursor.into_inner()).unwrap_err();
        assert!(matches!(err, Error::CorruptArchive(msg) if msg.contains(MANIFEST_PATH)));
    }

    #[test]
    fn unreadable_manifest_is_corrupt() {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut cursor);
            zip.start_file(MANIFEST_PATH, entry_options()).unwrap();
            zip.write_all(b"{ not json").unwrap();
            zip.finish().unwrap();
        }
        assert!(matches!(
            unpack(&cursor.into_inner()),
            Err(Error::CorruptArchive(_))
        ));
    }

    #[test]
    fn checksum_mismatch_is_corrupt() {
        let (mut manifest, files) = bundle();
        manifest.files[0].sha256 = sha256_hex(b"something else");
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut cursor);
            zip.start_file(MANIFEST_PATH, entry_options()).unwrap();
            zip.write_all(&serde_json::to_vec(&manifest).unwrap()).unwrap();
            for (id, file) in &files {
                zip.start_file(blob_path(*id), entry_options()).unwrap();
                zip.write_all(&file.content).unwrap();
            }
            zip.finish().unwrap();
        }
        assert!(matches!(
            unpack(&cursor.into_inner()),
            Err(Error::CorruptArchive(msg)) if msg.contains("checksum")
        ));
    }

    #[test]
    fn unsupported_version_is_corrupt() {
        let (mut manifest, _) = bundle();
        manifest.format_version = 99;
        manifest.files.clear();
        let bytes = serde_json::to_vec(&manifest).unwrap();
        assert!(matches!(parse_manifest(&bytes), Err(Error::CorruptArchive(_))));
    }

    #[test]
    fn blob_larger_than_declared_is_corrupt() {
        let (mut manifest, files) = bundle();
        manifest.files[0].size = 4;
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut cursor);
            zip.start_file(MANIFEST_PATH, entry_options()).unwrap();
            zip.write_all(&serde_json::to_vec(&manifest).unwrap()).unwrap();
            for (id, file) in &files {
                zip.start_file(blob_path(*id), entry_options()).unwrap();
                zip.write_all(&file.content).unwrap();
            }
            zip.finish().unwrap();
        }
        assert!(matches!(
            unpack(&cursor.into_inner()),
            Err(Error::CorruptArchive(msg)) if msg.contains("limit")
        ));
    }

    #[test]
    fn read_entry_stops_at_the_limit() {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut cursor);
            zip.start_file("files/zeros", entry_options()).unwrap();
            zip.write_all(&vec![0u8; 64 * 1024]).unwrap();
            zip.finish().unwrap();
        }
        let mut archive = ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();

        assert!(matches!(
            read_entry(&mut archive, "files/zeros", 1024),
            Err(Error::CorruptArchive(_))
        ));
        assert_eq!(
            read_entry(&mut archive, "files/zeros", 64 * 1024).unwrap().len(),
            64 * 1024
        );
    }
}
