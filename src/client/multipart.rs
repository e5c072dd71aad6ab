//! Multipart body encoding for uploads.
//!
//! Uploads are described by a list of [`Entry`] values: a file (in-memory
//! bytes, an async reader, or a path on disk), a directory (in-memory
//! children, or a path enumerated when the encoder reaches it) or a symlink
//! (only its target is sent, the link is never followed).
//!
//! [`MultipartBody`] turns the entries into a lazily produced byte stream.
//! Files are read chunk by chunk as the stream is polled and directories are
//! listed when the depth-first traversal reaches them, so an upload of a large
//! tree never sits in memory as a whole.
//!
//! # Part Layout
//!
//! ```text
//! --<boundary>\r\n
//! Content-Disposition: form-data; name="file"; filename="<escaped path>"\r\n
//! Content-Type: application/octet-stream | application/x-directory | application/symlink\r\n
//! \r\n
//! <file bytes | nothing | symlink target>
//! \r\n--<boundary>\r\n
//! ...
//! \r\n--<boundary>--\r\n
//! ```
//!
//! Part names are `/`-joined relative paths rooted at each top-level entry's
//! name. Children are visited in name order, which makes the encoding a pure
//! function of the tree: the daemon content-addresses the result, so two
//! uploads of the same tree must produce the same bytes.
//!
//! # Examples
//!
//! ```
//! use ipfs_shell::client::{Entry, MultipartBody};
//!
//! # tokio_test::block_on(async {
//! let body = MultipartBody::with_boundary(
//!     vec![Entry::directory("docs", vec![Entry::bytes("b.txt", "B"), Entry::bytes("a.txt", "A")])],
//!     "XYZ",
//! );
//! let encoded = body.encode_to_vec().await.unwrap();
//! let text = String::from_utf8(encoded).unwrap();
//! assert!(text.find("docs%2Fa.txt").unwrap() < text.find("docs%2Fb.txt").unwrap());
//! # });
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::{self, Stream, TryStreamExt};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::client::utils::join_part_path;
use crate::protocol::constants::{headers, media};
use crate::protocol::content_disposition;

/// Read size for file bodies.
const CHUNK_SIZE: usize = 64 * 1024;

/// Multipart field name the daemon expects for every part.
const FIELD_NAME: &str = "file";

/// Boxed async reader used as a file body.
pub type BoxedReader = Pin<Box<dyn AsyncRead + Send>>;

/// Lazily encoded multipart byte stream.
pub type MultipartStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Where a file entry's bytes come from.
pub enum FileSource {
    /// Bytes already in memory.
    Bytes(Bytes),
    /// A file opened when the encoder reaches it.
    Path(PathBuf),
    /// An arbitrary reader, drained when the encoder reaches it.
    Reader(BoxedReader),
}

/// Where a directory entry's children come from.
pub enum Children {
    /// An explicit list of entries.
    Entries(Vec<Entry>),
    /// A directory listed when the encoder reaches it.
    Path {
        /// Directory to list.
        path: PathBuf,
        /// Descend into subdirectories; otherwise only files and symlinks are sent.
        recursive: bool,
        /// Send names starting with `.`.
        hidden: bool,
    },
}

/// One named item of an upload.
pub enum Entry {
    /// A regular file.
    File {
        /// Name of the part, relative to the parent directory.
        name: String,
        /// File contents.
        source: FileSource,
    },
    /// A directory and its children.
    Directory {
        /// Name of the directory, relative to its parent.
        name: String,
        /// Directory contents.
        children: Children,
    },
    /// A symbolic link; only the target is sent.
    Symlink {
        /// Name of the link, relative to the parent directory.
        name: String,
        /// Link target, sent verbatim.
        target: String,
    },
}

impl Entry {
    /// A file with in-memory contents.
    pub fn bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Entry::File {
            name: name.into(),
            source: FileSource::Bytes(data.into()),
        }
    }

    /// A file whose contents are read from `reader` during encoding.
    pub fn reader<R>(name: impl Into<String>, reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Entry::File {
            name: name.into(),
            source: FileSource::Reader(Box::pin(reader)),
        }
    }

    /// A file read from disk during encoding.
    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Entry::File {
            name: name.into(),
            source: FileSource::Path(path.into()),
        }
    }

    /// A directory with explicit children.
    pub fn directory(name: impl Into<String>, children: Vec<Entry>) -> Self {
        Entry::Directory {
            name: name.into(),
            children: Children::Entries(children),
        }
    }

    /// A symlink pointing at `target`.
    pub fn symlink(name: impl Into<String>, target: impl Into<String>) -> Self {
        Entry::Symlink {
            name: name.into(),
            target: target.into(),
        }
    }

    /// Describe a filesystem path, named after its base name.
    ///
    /// Symlinks are recorded by target, directories are listed lazily and
    /// only descended into when `recursive` is set. Entries below `path`
    /// whose names start with `.` are skipped unless `hidden` is set; `path`
    /// itself is always included.
    pub async fn from_path(
        path: impl AsRef<Path>,
        recursive: bool,
        hidden: bool,
    ) -> io::Result<Self> {
        let path = path.as_ref();
        let name = base_name(path);
        entry_for(path, name, recursive, hidden).await
    }

    /// Name of this entry relative to its parent.
    pub fn name(&self) -> &str {
        match self {
            Entry::File { name, .. } | Entry::Directory { name, .. } | Entry::Symlink { name, .. } => {
                name
            }
        }
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::File { name, source } => {
                let source = match source {
                    FileSource::Bytes(b) => format!("{} bytes", b.len()),
                    FileSource::Path(p) => p.display().to_string(),
                    FileSource::Reader(_) => "reader".to_string(),
                };
                f.debug_struct("File").field("name", name).field("source", &source).finish()
            }
            Entry::Directory { name, children } => {
                let mut d = f.debug_struct("Directory");
                d.field("name", name);
                match children {
                    Children::Entries(entries) => d.field("children", entries),
                    Children::Path {
                        path,
                        recursive,
                        hidden,
                    } => d
                        .field("path", path)
                        .field("recursive", recursive)
                        .field("hidden", hidden),
                };
                d.finish()
            }
            Entry::Symlink { name, target } => f
                .debug_struct("Symlink")
                .field("name", name)
                .field("target", target)
                .finish(),
        }
    }
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

async fn entry_for(path: &Path, name: String, recursive: bool, hidden: bool) -> io::Result<Entry> {
    let meta = tokio::fs::symlink_metadata(path).await?;
    if meta.file_type().is_symlink() {
        let target = tokio::fs::read_link(path).await?;
        Ok(Entry::Symlink {
            name,
            target: target.to_string_lossy().into_owned(),
        })
    } else if meta.is_dir() {
        Ok(Entry::Directory {
            name,
            children: Children::Path {
                path: path.to_path_buf(),
                recursive,
                hidden,
            },
        })
    } else {
        Ok(Entry::file(name, path))
    }
}

/// A multipart body: entries plus the boundary separating their parts.
#[derive(Debug)]
pub struct MultipartBody {
    boundary: String,
    entries: Vec<Entry>,
}

impl MultipartBody {
    /// Body with a freshly generated random boundary.
    pub fn new(entries: Vec<Entry>) -> Self {
        Self::with_boundary(entries, uuid::Uuid::new_v4().simple().to_string())
    }

    /// Body with a caller-chosen boundary.
    pub fn with_boundary(entries: Vec<Entry>, boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            entries,
        }
    }

    /// The boundary token shared by every part.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// `Content-Type` header value for this body.
    pub fn content_type(&self) -> String {
        format!("{}; boundary={}", media::MULTIPART_FORM, self.boundary)
    }

    /// Turn the body into a lazily produced byte stream.
    pub fn into_stream(self) -> MultipartStream {
        let mut stack: Vec<(String, Entry)> = Vec::with_capacity(self.entries.len());
        for entry in self.entries.into_iter().rev() {
            stack.push((entry.name().to_string(), entry));
        }

        let encoder = Encoder {
            boundary: self.boundary,
            stack,
            body: None,
            parts: 0,
            finished: false,
        };

        Box::pin(stream::try_unfold(encoder, |mut encoder| async move {
            Ok::<_, io::Error>(encoder.next_chunk().await?.map(|chunk| (chunk, encoder)))
        }))
    }

    /// Encode the whole body into memory.
    ///
    /// Meant for small bodies and tests; uploads go through
    /// [`into_stream`](Self::into_stream).
    pub async fn encode_to_vec(self) -> io::Result<Vec<u8>> {
        let mut stream = self.into_stream();
        let mut out = Vec::new();
        while let Some(chunk) = stream.try_next().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }
}

/// Depth-first traversal state behind [`MultipartBody::into_stream`].
struct Encoder {
    boundary: String,
    /// Entries still to encode, paired with their relative path; top is next
    stack: Vec<(String, Entry)>,
    /// File body currently being streamed
    body: Option<BoxedReader>,
    parts: usize,
    finished: bool,
}

impl Encoder {
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        loop {
            if let Some(body) = self.body.as_mut() {
                let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
                if body.read_buf(&mut buf).await? > 0 {
                    return Ok(Some(buf.freeze()));
                }
                self.body = None;
                continue;
            }

            match self.stack.pop() {
                Some((path, entry)) => return self.start_part(path, entry).await.map(Some),
                None if !self.finished => {
                    self.finished = true;
                    return Ok(Some(self.closing()));
                }
                None => return Ok(None),
            }
        }
    }

    async fn start_part(&mut self, path: String, entry: Entry) -> io::Result<Bytes> {
        match entry {
            Entry::File { source, .. } => {
                let mut chunk = self.part_header(&path, media::OCTET_STREAM);
                match source {
                    FileSource::Bytes(data) => chunk.put_slice(&data),
                    FileSource::Path(file) => {
                        self.body = Some(Box::pin(tokio::fs::File::open(&file).await?));
                    }
                    FileSource::Reader(reader) => self.body = Some(reader),
                }
                Ok(chunk.freeze())
            }
            Entry::Symlink { target, .. } => {
                let mut chunk = self.part_header(&path, media::SYMLINK);
                chunk.put_slice(target.as_bytes());
                Ok(chunk.freeze())
            }
            Entry::Directory { children, .. } => {
                let chunk = self.part_header(&path, media::DIRECTORY);
                let mut children = match children {
                    Children::Entries(entries) => entries,
                    Children::Path {
                        path: dir,
                        recursive,
                        hidden,
                    } => list_dir(&dir, recursive, hidden).await?,
                };
                children.sort_by(|a, b| a.name().cmp(b.name()));
                for child in children.into_iter().rev() {
                    let child_path = join_part_path(&path, child.name());
                    self.stack.push((child_path, child));
                }
                Ok(chunk.freeze())
            }
        }
    }

    fn part_header(&mut self, path: &str, content_type: &str) -> BytesMut {
        let mut out = BytesMut::new();
        if self.parts > 0 {
            out.put_slice(b"\r\n");
        }
        self.parts += 1;
        out.put_slice(format!("--{}\r\n", self.boundary).as_bytes());
        out.put_slice(
            format!(
                "{}: {}\r\n",
                headers::CONTENT_DISPOSITION,
                content_disposition(FIELD_NAME, path)
            )
            .as_bytes(),
        );
        out.put_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        out
    }

    fn closing(&self) -> Bytes {
        let lead = if self.parts > 0 { "\r\n" } else { "" };
        Bytes::from(format!("{lead}--{}--\r\n", self.boundary))
    }
}

async fn list_dir(dir: &Path, recursive: bool, hidden: bool) -> io::Result<Vec<Entry>> {
    let mut listing = tokio::fs::read_dir(dir).await?;
    let mut children = Vec::new();
    while let Some(item) = listing.next_entry().await? {
        let name = item.file_name().to_string_lossy().into_owned();
        if !hidden && name.starts_with('.') {
            continue;
        }
        let entry = entry_for(&item.path(), name, recursive, hidden).await?;
        if matches!(entry, Entry::Directory { .. }) && !recursive {
            continue;
        }
        children.push(entry);
    }
    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn encode(entries: Vec<Entry>) -> String {
        let body = MultipartBody::with_boundary(entries, "BOUNDARY");
        String::from_utf8(body.encode_to_vec().await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_single_file_layout() {
        let text = encode(vec![Entry::bytes("", "hello")]).await;
        assert_eq!(
            text,
            "--BOUNDARY\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             hello\
             \r\n--BOUNDARY--\r\n"
        );
    }

    #[tokio::test]
    async fn test_empty_body_is_just_terminator() {
        assert_eq!(encode(vec![]).await, "--BOUNDARY--\r\n");
    }

    #[tokio::test]
    async fn test_empty_file_still_gets_a_part() {
        let text = encode(vec![Entry::bytes("empty", Bytes::new())]).await;
        assert!(text.contains("filename=\"empty\""));
        assert!(text.contains("application/octet-stream\r\n\r\n\r\n--BOUNDARY--"));
    }

    #[tokio::test]
    async fn test_empty_directory_still_gets_a_part() {
        let text = encode(vec![Entry::directory("d", vec![])]).await;
        assert!(text.contains("filename=\"d\""));
        assert!(text.contains("Content-Type: application/x-directory"));
    }

    #[tokio::test]
    async fn test_symlink_sends_target_not_contents() {
        let text = encode(vec![Entry::symlink("link", "/etc/passwd")]).await;
        assert!(text.contains("Content-Type: application/symlink\r\n\r\n/etc/passwd"));
    }

    #[tokio::test]
    async fn test_children_sorted_and_nested() {
        let text = encode(vec![Entry::directory(
            "root",
            vec![
                Entry::bytes("z.txt", "z"),
                Entry::directory("sub", vec![Entry::bytes("inner", "i")]),
                Entry::bytes("a.txt", "a"),
            ],
        )])
        .await;
        let order: Vec<usize> = ["root%2Fa.txt", "root%2Fsub\"", "root%2Fsub%2Finner", "root%2Fz.txt"]
            .iter()
            .map(|needle| text.find(needle).unwrap())
            .collect();
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(order, sorted);
    }

    #[tokio::test]
    async fn test_reader_source_streams() {
        let data = vec![7u8; CHUNK_SIZE * 2 + 10];
        let body = MultipartBody::with_boundary(
            vec![Entry::reader("big", std::io::Cursor::new(data.clone()))],
            "B",
        );
        let mut stream = body.into_stream();
        let mut chunks = 0;
        let mut total = Vec::new();
        while let Some(chunk) = stream.try_next().await.unwrap() {
            chunks += 1;
            total.extend_from_slice(&chunk);
        }
        assert!(chunks > 3);
        assert!(total.windows(data.len()).any(|w| w == data.as_slice()));
    }

    #[tokio::test]
    async fn test_filesystem_tree_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("tree");
        std::fs::create_dir_all(root.join("b/deeper")).unwrap();
        std::fs::create_dir_all(root.join("a")).unwrap();
        std::fs::write(root.join("b/deeper/x.bin"), b"xx").unwrap();
        std::fs::write(root.join("a/one.txt"), b"1").unwrap();
        std::fs::write(root.join("top.txt"), b"top").unwrap();
        std::fs::write(root.join("empty"), b"").unwrap();

        let first = MultipartBody::with_boundary(vec![Entry::from_path(&root, true, false).await.unwrap()], "B")
            .encode_to_vec()
            .await
            .unwrap();
        let second = MultipartBody::with_boundary(vec![Entry::from_path(&root, true, false).await.unwrap()], "B")
            .encode_to_vec()
            .await
            .unwrap();
        assert_eq!(first, second);

        let text = String::from_utf8(first).unwrap();
        assert!(text.contains("filename=\"tree%2Fb%2Fdeeper%2Fx.bin\""));
        assert!(text.contains("filename=\"tree%2Fempty\""));
        assert!(text.find("tree%2Fa%2Fone.txt").unwrap() < text.find("tree%2Fb\"").unwrap());
    }

    #[tokio::test]
    async fn test_non_recursive_skips_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("flat");
        std::fs::create_dir_all(root.join("nested")).unwrap();
        std::fs::write(root.join("nested/hidden.txt"), b"h").unwrap();
        std::fs::write(root.join("shown.txt"), b"s").unwrap();

        let text = String::from_utf8(
            MultipartBody::with_boundary(vec![Entry::from_path(&root, false, false).await.unwrap()], "B")
                .encode_to_vec()
                .await
                .unwrap(),
        )
        .unwrap();
        assert!(text.contains("flat%2Fshown.txt"));
        assert!(!text.contains("nested"));
    }

    #[tokio::test]
    async fn test_dotfiles_skipped_unless_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("site");
        std::fs::create_dir_all(root.join(".git/objects")).unwrap();
        std::fs::create_dir_all(root.join("css")).unwrap();
        std::fs::write(root.join(".env"), b"TOKEN=1").unwrap();
        std::fs::write(root.join(".git/objects/pack"), b"p").unwrap();
        std::fs::write(root.join("css/.cache"), b"c").unwrap();
        std::fs::write(root.join("css/main.css"), b"body{}").unwrap();

        let encode_tree = |hidden: bool| {
            let root = root.clone();
            async move {
                let entry = Entry::from_path(&root, true, hidden).await.unwrap();
                let bytes = MultipartBody::with_boundary(vec![entry], "B")
                    .encode_to_vec()
                    .await
                    .unwrap();
                String::from_utf8(bytes).unwrap()
            }
        };

        let visible = encode_tree(false).await;
        assert!(visible.contains("site%2Fcss%2Fmain.css"));
        assert!(!visible.contains(".env"));
        assert!(!visible.contains(".git"));
        assert!(!visible.contains(".cache"));

        let all = encode_tree(true).await;
        assert!(all.contains("site%2F.env"));
        assert!(all.contains("site%2F.git%2Fobjects%2Fpack"));
        assert!(all.contains("site%2Fcss%2F.cache"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_filesystem_symlink_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("links");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("real.txt"), b"secret contents").unwrap();
        std::os::unix::fs::symlink("real.txt", root.join("alias")).unwrap();

        let text = String::from_utf8(
            MultipartBody::with_boundary(vec![Entry::from_path(&root, true, false).await.unwrap()], "B")
                .encode_to_vec()
                .await
                .unwrap(),
        )
        .unwrap();
        assert!(text.contains("filename=\"links%2Falias\"\r\nContent-Type: application/symlink\r\n\r\nreal.txt"));
        assert_eq!(text.matches("secret contents").count(), 1);
    }

    #[test]
    fn test_random_boundaries_differ() {
        let a = MultipartBody::new(vec![]);
        let b = MultipartBody::new(vec![]);
        assert_ne!(a.boundary(), b.boundary());
        assert_eq!(a.boundary().len(), 32);
        assert!(a.content_type().starts_with("multipart/form-data; boundary="));
    }
}
