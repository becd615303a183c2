//! The mailbox session: one live connection, webmail-shaped operations.
//!
//! A [`MailboxSession`] owns exactly one connection to the mail store
//! and moves through `login → selected folder → … → logged out`. Login
//! lands in INBOX with a sorted UID listing already computed; every
//! listing operation afterwards works against that cached ordering
//! until a mutation invalidates it.
//!
//! Commands are strictly request-then-response — nothing is pipelined —
//! and the session is not thread-safe: confine it to one execution
//! context (one per webmail request context, typically pooled per
//! user). Callers own retry policy; transient I/O failures propagate
//! immediately. There is no per-command timeout: a caller needing
//! cancellation drops the session, which closes the connection.

#![allow(clippy::missing_errors_doc)]

use tokio::io::{AsyncRead, AsyncWrite};

use crate::command::{Command, FetchItems, SearchCriteria, StoreAction, TagGenerator};
use crate::parser::fetch::{DecoderRegistry, FetchAssembler, FetchedMessage};
use crate::parser::{Chunk, ResponseLine, Status, flatten, parse_line};
use crate::types::{Flag, Folder, FolderInfo, IdSet, SortOrder};
use crate::{Error, Result};

use super::config::{Config, Security};
use super::framed::FramedStream;
use super::stream::{ImapStream, connect};

/// A live session against the mail store.
///
/// Generic over the transport so tests can substitute a scripted
/// stream; production code uses [`MailboxSession::login`], which
/// connects per the [`Config`].
pub struct MailboxSession<S = ImapStream> {
    stream: FramedStream<S>,
    tags: TagGenerator,
    registry: DecoderRegistry,
    folder: Folder,
    order: SortOrder,
    /// Ordered UID listing for the current folder; `None` after a
    /// mutation until recomputed.
    listing: Option<Vec<u32>>,
    exists: u32,
    closed: bool,
}

impl MailboxSession<ImapStream> {
    /// Connects, authenticates, and selects INBOX.
    ///
    /// # Errors
    ///
    /// Transport failures surface as [`Error::Io`]/[`Error::Tls`];
    /// rejected credentials as [`Error::Auth`]. Both are terminal for
    /// this attempt — the caller may retry with a fresh `login`.
    pub async fn login(config: &Config, username: &str, password: &str) -> Result<Self> {
        Self::login_with_registry(config, username, password, DecoderRegistry::default()).await
    }

    /// Like [`login`](Self::login), with a caller-supplied decoder
    /// registry for the fetch assembler.
    pub async fn login_with_registry(
        config: &Config,
        username: &str,
        password: &str,
        registry: DecoderRegistry,
    ) -> Result<Self> {
        let stream = connect(config).await?;
        let mut framed = FramedStream::new(stream);
        read_greeting(&mut framed).await?;

        let mut tags = TagGenerator::new();
        if config.security == Security::StartTls {
            framed = upgrade_starttls(framed, &mut tags, &config.host).await?;
        }
        tracing::info!(host = %config.host, "connected");

        Self::authenticate(framed, tags, username, password, registry).await
    }
}

impl<S> MailboxSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Builds a session over an already-connected transport: reads the
    /// greeting, authenticates, selects INBOX.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`MailboxSession::login`].
    pub async fn from_stream(stream: S, username: &str, password: &str) -> Result<Self> {
        Self::from_stream_with_registry(stream, username, password, DecoderRegistry::default())
            .await
    }

    /// Like [`from_stream`](Self::from_stream), with a caller-supplied
    /// decoder registry.
    pub async fn from_stream_with_registry(
        stream: S,
        username: &str,
        password: &str,
        registry: DecoderRegistry,
    ) -> Result<Self> {
        let mut framed = FramedStream::new(stream);
        read_greeting(&mut framed).await?;
        Self::authenticate(framed, TagGenerator::new(), username, password, registry).await
    }

    async fn authenticate(
        framed: FramedStream<S>,
        tags: TagGenerator,
        username: &str,
        password: &str,
        registry: DecoderRegistry,
    ) -> Result<Self> {
        let mut session = Self {
            stream: framed,
            tags,
            registry,
            folder: Folder::inbox(),
            order: SortOrder::default(),
            listing: None,
            exists: 0,
            closed: false,
        };

        let login = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        match session.run(&login).await {
            Ok(_) => {}
            Err(Error::No(text)) => return Err(Error::Auth(text)),
            Err(e) => return Err(e),
        }
        tracing::info!("authenticated");

        session.select_folder("INBOX").await?;
        Ok(session)
    }

    /// Returns the currently selected folder.
    #[must_use]
    pub const fn selected_folder(&self) -> &Folder {
        &self.folder
    }

    /// Message count reported by the last SELECT.
    #[must_use]
    pub const fn exists(&self) -> u32 {
        self.exists
    }

    /// The cached ordered UID listing, `None` when invalidated by a
    /// mutation. [`refresh`](Self::refresh) recomputes it.
    #[must_use]
    pub fn message_ids(&self) -> Option<&[u32]> {
        self.listing.as_deref()
    }

    /// The current sort order.
    #[must_use]
    pub const fn sort_order(&self) -> SortOrder {
        self.order
    }

    /// Selects a folder and recomputes its sorted listing.
    pub async fn select_folder(&mut self, name: &str) -> Result<()> {
        self.ensure_open()?;
        let folder = Folder::new(name);
        let responses = self
            .run(&Command::Select {
                folder: folder.clone(),
            })
            .await?;

        self.exists = responses
            .iter()
            .find_map(|r| match parse_line(&flatten(r)) {
                Ok(ResponseLine::Exists(n)) => Some(n),
                _ => None,
            })
            .unwrap_or(0);
        self.folder = folder;
        self.listing = None;
        self.refresh().await
    }

    /// Changes the sort order and recomputes the current folder's
    /// listing.
    pub async fn sort(&mut self, order: SortOrder) -> Result<()> {
        self.ensure_open()?;
        self.order = order;
        self.refresh().await
    }

    /// Replaces the cached listing with the messages matching
    /// `criteria`, in the current sort order. Returns the match count.
    pub async fn search(&mut self, criteria: SearchCriteria) -> Result<usize> {
        self.ensure_open()?;
        let ids = self.run_sort(criteria).await?;
        let count = ids.len();
        self.listing = Some(ids);
        Ok(count)
    }

    /// Recomputes the full sorted listing for the current folder.
    pub async fn refresh(&mut self) -> Result<()> {
        self.ensure_open()?;
        let ids = self.run_sort(SearchCriteria::All).await?;
        self.listing = Some(ids);
        Ok(())
    }

    /// Fetches `items` for the given UIDs.
    ///
    /// Messages come back in the order of `uids` — the server is free
    /// to answer in any order, so the result is re-sequenced by the
    /// requested ids. Ids the server did not answer for are absent.
    pub async fn fetch(&mut self, uids: &[u32], items: FetchItems) -> Result<Vec<FetchedMessage>> {
        self.ensure_open()?;
        if uids.is_empty() {
            return Ok(Vec::new());
        }

        let responses = self
            .run(&Command::Fetch {
                set: IdSet::from_ids(uids),
                items,
                uid: true,
            })
            .await?;

        let chunks: Vec<Chunk> = responses
            .iter()
            .filter(|r| is_fetch_data(r))
            .flat_map(|r| r.iter().cloned())
            .collect();

        let assembler = FetchAssembler::new(&self.registry);
        let mut by_uid = match assembler.assemble(&chunks) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(
                    raw = %String::from_utf8_lossy(&flatten(&chunks)),
                    "failed to parse fetch response"
                );
                return Err(e);
            }
        };

        Ok(uids.iter().filter_map(|uid| by_uid.remove(uid)).collect())
    }

    /// Fetches one page of the sorted listing. Pages are 1-based;
    /// recomputes the listing first when a mutation invalidated it.
    pub async fn fetch_page(
        &mut self,
        page: usize,
        per_page: usize,
        items: FetchItems,
    ) -> Result<Vec<FetchedMessage>> {
        self.ensure_open()?;
        if page == 0 || per_page == 0 {
            return Ok(Vec::new());
        }
        if self.listing.is_none() {
            self.refresh().await?;
        }
        let ids = self.listing.as_deref().unwrap_or_default();
        let start = (page - 1).saturating_mul(per_page).min(ids.len());
        let end = start.saturating_add(per_page).min(ids.len());
        let slice = ids[start..end].to_vec();
        self.fetch(&slice, items).await
    }

    /// Adds or removes one flag on the given UIDs.
    pub async fn mutate_flags(&mut self, uids: &[u32], flag: Flag, add: bool) -> Result<()> {
        self.ensure_open()?;
        if uids.is_empty() {
            return Ok(());
        }
        let action = if add {
            StoreAction::AddFlags(vec![flag])
        } else {
            StoreAction::RemoveFlags(vec![flag])
        };
        self.run(&Command::Store {
            set: IdSet::from_ids(uids),
            action,
            uid: true,
            silent: true,
        })
        .await?;
        self.listing = None;
        Ok(())
    }

    /// Moves the given UIDs to another folder: COPY, mark \Deleted,
    /// EXPUNGE.
    pub async fn move_messages(&mut self, uids: &[u32], destination: &str) -> Result<()> {
        self.ensure_open()?;
        if uids.is_empty() {
            return Ok(());
        }
        let set = IdSet::from_ids(uids);
        self.run(&Command::Copy {
            set: set.clone(),
            folder: Folder::new(destination),
            uid: true,
        })
        .await?;
        self.run(&Command::Store {
            set,
            action: StoreAction::AddFlags(vec![Flag::Deleted]),
            uid: true,
            silent: true,
        })
        .await?;
        self.run(&Command::Expunge).await?;
        self.listing = None;
        Ok(())
    }

    /// Expunges all messages marked \Deleted in `folder`, selecting it
    /// first when it is not the current folder.
    pub async fn expunge_all(&mut self, folder: &str) -> Result<()> {
        self.ensure_open()?;
        if self.folder.as_str() != folder {
            self.select_folder(folder).await?;
        }
        self.run(&Command::Expunge).await?;
        self.listing = None;
        Ok(())
    }

    /// Lists all folders, names decoded to native UTF-8.
    pub async fn list_folders(&mut self) -> Result<Vec<FolderInfo>> {
        self.ensure_open()?;
        let responses = self
            .run(&Command::List {
                reference: String::new(),
                pattern: "*".to_string(),
            })
            .await?;

        let mut folders = Vec::new();
        for response in &responses {
            if let ResponseLine::List(info) = parse_line(&flatten(response))? {
                folders.push(info);
            }
        }
        Ok(folders)
    }

    /// Logs out and closes the session. Terminal: every later call
    /// fails with [`Error::SessionClosed`].
    pub async fn logout(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.closed = true;

        let tag = self.tags.next_tag();
        let bytes = Command::Logout.serialize(&tag);
        self.stream.write_command(&bytes).await?;
        // The server answers BYE then the tagged OK; either way the
        // session is done.
        let _ = self.stream.read_until_tagged(&tag).await;
        tracing::info!("logged out");
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::SessionClosed);
        }
        Ok(())
    }

    /// Issues one command and waits for its tagged completion.
    async fn run(&mut self, command: &Command) -> Result<Vec<Vec<Chunk>>> {
        let tag = self.tags.next_tag();
        tracing::debug!(verb = command.verb(), %tag, "issuing command");
        self.stream.write_command(&command.serialize(&tag)).await?;
        let responses = self.stream.read_until_tagged(&tag).await?;
        check_tagged(&responses, &tag)?;
        Ok(responses)
    }

    /// Runs UID SORT with the session's order and the given criteria,
    /// returning the ordered UID list.
    async fn run_sort(&mut self, criteria: SearchCriteria) -> Result<Vec<u32>> {
        let responses = self
            .run(&Command::Sort {
                order: self.order,
                criteria,
                uid: true,
            })
            .await?;

        let mut ids = Vec::new();
        for response in &responses {
            if let Ok(ResponseLine::Sort(found)) = parse_line(&flatten(response)) {
                ids.extend(found);
            }
        }
        Ok(ids)
    }
}

impl<S> std::fmt::Debug for MailboxSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxSession")
            .field("folder", &self.folder)
            .field("exists", &self.exists)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// Reads and checks the server greeting.
async fn read_greeting<S>(framed: &mut FramedStream<S>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let greeting = framed.read_response().await?;
    if let Ok(ResponseLine::Bye(text)) = parse_line(&flatten(&greeting)) {
        return Err(Error::Bye(text));
    }
    Ok(())
}

/// Issues STARTTLS on the plaintext stream and performs the handshake.
async fn upgrade_starttls(
    mut framed: FramedStream<ImapStream>,
    tags: &mut TagGenerator,
    host: &str,
) -> Result<FramedStream<ImapStream>> {
    let tag = tags.next_tag();
    framed
        .write_command(format!("{tag} STARTTLS\r\n").as_bytes())
        .await?;
    let responses = framed.read_until_tagged(&tag).await?;
    check_tagged(&responses, &tag)?;

    let upgraded = framed.into_inner().upgrade_to_tls(host).await?;
    Ok(FramedStream::new(upgraded))
}

/// Finds the tagged completion among the responses and maps NO/BAD to
/// errors.
fn check_tagged(responses: &[Vec<Chunk>], tag: &str) -> Result<()> {
    for response in responses.iter().rev() {
        match parse_line(&flatten(response)) {
            Ok(ResponseLine::Tagged {
                tag: found,
                status,
                text,
            }) if found == tag => {
                return match status {
                    Status::Ok => Ok(()),
                    Status::No => Err(Error::No(text)),
                    Status::Bad => Err(Error::Bad(text)),
                };
            }
            Ok(ResponseLine::Bye(text)) => return Err(Error::Bye(text)),
            _ => {}
        }
    }
    Err(Error::Protocol("missing tagged response".to_string()))
}

/// True when a response carries FETCH data (`* <n> FETCH …` or the
/// tupled `<n> (…` shape).
fn is_fetch_data(response: &[Chunk]) -> bool {
    let Some(Chunk::Bare(text) | Chunk::Tuple { text, .. }) = response.first() else {
        return false;
    };
    let t = text.strip_prefix("* ").unwrap_or(text);
    let digits = t.len() - t.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return false;
    }
    let rest = &t[digits..];
    rest.starts_with(" FETCH ") || rest.starts_with(" (")
}
