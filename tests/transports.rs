//! Integration tests for fetching, listing and packing over the in-memory transports.

use bzip2::Compression;
use bzip2::write::BzEncoder;
use seqpack::io::cloud::{DfsPath, FakeDistributedFsIO, FakeHttpIO, FakeObjectIO};
use seqpack::*;
use std::fs;
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;

fn bzip2(data: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[test]
fn test_object_store_listing_pages_through_everything() -> anyhow::Result<()> {
    let store = FakeObjectIO::with_page_size(4);
    for i in 0..25 {
        store.put_object("nex", &format!("NEX-DCP30/2006/tile{i:02}.nc"), b"x");
    }
    store.put_object("nex", "NEX-DCP30/2006/readme.txt", b"r");
    store.put_object("nex", "NEX-DCP30/2007/tile00.nc", b"y");
    let transports = Transports::offline().with_object_store(Arc::new(store.clone()));

    let listed = SourceLister::new(transports).list("s3://nex/NEX-DCP30/2006/", "nc")?;
    assert_eq!(listed.len(), 25);
    assert_eq!(listed[0], "s3://nex/NEX-DCP30/2006/tile00.nc");
    assert_eq!(listed[24], "s3://nex/NEX-DCP30/2006/tile24.nc");
    let mut deduped = listed.clone();
    deduped.dedup();
    assert_eq!(deduped, listed);
    // 26 keys under the prefix at 4 per page
    assert_eq!(store.pages_served(), 7);
    Ok(())
}

#[test]
fn test_bz2_sources_are_stored_decompressed() -> anyhow::Result<()> {
    let image = b"P6\n4 4\n255\n".iter().copied().chain([0x7f; 48]).collect::<Vec<u8>>();
    let store = FakeObjectIO::new();
    store.put_object("imgs", "photos/cat.ppm.bz2", &bzip2(&image)?);
    let transports = Transports::offline().with_object_store(Arc::new(store));

    let dir = TempDir::new()?;
    let dest = format!("file://{}/cat.seq", dir.path().display());
    let codec = codec_by_name("lz4")?;
    Packer::new(transports.clone()).pack("s3://imgs/photos/cat.ppm.bz2", &dest, codec.as_ref())?;

    let all = ContainerReader::new(transports).read_all(&dest)?;
    assert_eq!(all["s3://imgs/photos/cat.ppm.bz2"], image);
    Ok(())
}

#[test]
fn test_dfs_containers_round_trip() -> anyhow::Result<()> {
    let dfs = FakeDistributedFsIO::new();
    dfs.put_file(&DfsPath::new("nn:8020", "/raw/events.log"), b"one\ntwo\nthree\n");
    let transports = Transports::offline().with_dfs(Arc::new(dfs.clone()));

    let codec = codec_by_name("bzip2")?;
    let summary = Packer::new(transports.clone()).pack(
        "hdfs://nn:8020/raw/events.log",
        "hdfs://nn:8020/packed/events.seq",
        codec.as_ref(),
    )?;
    assert_eq!(summary.total_payload_bytes(), 14);

    let stored = dfs
        .file(&DfsPath::new("nn:8020", "/packed/events.seq"))
        .expect("container written");
    assert_eq!(&stored[..3], b"SEQ");

    let reader = ContainerReader::new(transports);
    let records = reader.read_records("hdfs://nn:8020/packed/events.seq")?;
    assert_eq!(
        records,
        vec![Record::new("hdfs://nn:8020/raw/events.log", b"one\ntwo\nthree\n".to_vec())]
    );
    Ok(())
}

#[test]
fn test_line_container_is_copied_to_dfs() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let src = tmp.path().join("events.log");
    fs::write(&src, b"one\ntwo\nthree\n")?;
    let staged = tmp.path().join("staged/events.seq");

    let dfs = FakeDistributedFsIO::new();
    let transports = Transports::offline().with_dfs(Arc::new(dfs.clone()));
    let codec = codec_by_name("gzip")?;
    let summary = Packer::new(transports.clone()).pack_lines(
        &format!("file://{}", src.display()),
        &format!("file://{}", staged.display()),
        codec.as_ref(),
    )?;
    assert_eq!(summary.entries[0].records, 3);

    let copied = ContainerWriter::new(transports.clone()).copy_to_dfs(
        &format!("file://{}", staged.display()),
        "hdfs://nn:8020/packed/events.seq",
        true,
    )?;
    assert!(!staged.exists());
    assert!(copied > 0);

    let records =
        ContainerReader::new(transports).read_records("hdfs://nn:8020/packed/events.seq")?;
    assert_eq!(
        records,
        vec![
            Record::new("0", b"one".to_vec()),
            Record::new("1", b"two".to_vec()),
            Record::new("2", b"three".to_vec()),
        ]
    );
    Ok(())
}

#[test]
fn test_http_source() -> anyhow::Result<()> {
    let http = FakeHttpIO::new();
    http.insert("https://example.org/data/index.html", b"<html></html>");
    let transports = Transports::offline().with_http(Arc::new(http));

    let record = SourceResolver::new(transports).fetch("https://example.org/data/index.html")?;
    assert_eq!(record.key, "https://example.org/data/index.html");
    assert_eq!(record.value, b"<html></html>");
    Ok(())
}

#[test]
fn test_local_wildcard_pack() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("in");
    fs::create_dir(&input)?;
    fs::write(input.join("a.csv"), b"1,2")?;
    fs::write(input.join("b.csv"), b"3,4,5")?;
    fs::write(input.join("notes.md"), b"# notes")?;

    let out = format!("file://{}/out", dir.path().display());
    let pattern = format!("file://{}/*.csv", input.display());
    let codec = codec_by_name("default")?;
    let summary = Packer::new(Transports::offline()).pack(&pattern, &out, codec.as_ref())?;

    let destinations: Vec<_> = summary.entries.iter().map(|e| e.destination.clone()).collect();
    assert_eq!(destinations, vec![format!("{out}/a.csv.seq"), format!("{out}/b.csv.seq")]);

    let reader = ContainerReader::new(Transports::offline());
    let b = reader.read_all(&format!("{out}/b.csv.seq"))?;
    assert_eq!(b[&input.join("b.csv").display().to_string()], b"3,4,5");
    Ok(())
}

#[test]
fn test_rejected_requests() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let src = dir.path().join("x.bin");
    fs::write(&src, b"x")?;
    let input = format!("file://{}", src.display());
    let codec = codec_by_name("snappy")?;
    let packer = Packer::new(Transports::offline());

    let err = packer.pack(&input, "s3://bucket/x.seq", codec.as_ref()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnsupportedDestination);
    let err = packer.pack(&input, "http://host/x.seq", codec.as_ref()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnsupportedDestination);

    let err = packer.pack("gopher://host/x", "file:///tmp/x.seq", codec.as_ref()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnsupportedScheme);

    let err = packer
        .pack("s3://bucket/missing.bin", "file:///tmp/x.seq", codec.as_ref())
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::SourceNotFound);
    assert!(err.message.contains("s3://bucket/missing.bin"));
    Ok(())
}
