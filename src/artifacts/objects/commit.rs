//! Git commit object
//!
//! Commits represent snapshots of the repository at specific points in time.
//! They contain:
//! - A tree object ID (directory snapshot)
//! - Parent commit ID(s) (for history)
//! - Author and committer information
//! - Commit message
//!
//! ## Format
//!
//! On disk:
//! ```text
//! commit <size>\0
//! tree <tree-sha>
//! parent <parent-sha>
//! author <name> <email> <timestamp> <timezone>
//! committer <name> <email> <timestamp> <timezone>
//! <other headers, e.g. encoding or gpgsig>
//!
//! <commit message>
//! ```
//!
//! Headers this module does not interpret are kept in order and written back
//! unchanged, so decoding and re-encoding a commit preserves its hash.

use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{Error, Result};
use bytes::Bytes;
use chrono::{DateTime, FixedOffset};

/// Author or committer information
///
/// Contains name, email, and timestamp with timezone information.
/// Timestamps are kept at second precision, which is what gets serialized.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Author {
    name: String,
    email: String,
    timestamp: DateTime<FixedOffset>,
}

impl Author {
    /// Create a new author stamped with the current local time
    pub fn new(name: String, email: String) -> Self {
        let now = chrono::Local::now().fixed_offset();
        let timestamp = DateTime::from_timestamp(now.timestamp(), 0)
            .map(|utc| utc.with_timezone(now.offset()))
            .unwrap_or(now);

        Author {
            name,
            email,
            timestamp,
        }
    }

    pub fn new_with_timestamp(name: String, email: String, timestamp: DateTime<FixedOffset>) -> Self {
        Author {
            name,
            email,
            timestamp,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }

    /// "Name <email@example.com>"
    pub fn display_name(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }

    /// "Name <email> timestamp timezone", the header form
    pub fn display(&self) -> String {
        format!(
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.timestamp.timestamp(),
            self.timestamp.format("%z")
        )
    }

    /// Parse a user supplied date (RFC 2822 or `%Y-%m-%d %H:%M:%S %z`)
    pub fn parse_date(date: &str) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc2822(date)
            .or_else(|_| DateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S %z"))
            .ok()
    }
}

fn parse_timezone(timezone: &str) -> Option<FixedOffset> {
    let (sign, digits) = match timezone.as_bytes().first()? {
        b'+' => (1, &timezone[1..]),
        b'-' => (-1, &timezone[1..]),
        _ => return None,
    };
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let hours = digits[..2].parse::<i32>().ok()?;
    let minutes = digits[2..].parse::<i32>().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

impl TryFrom<&str> for Author {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        let invalid = || Error::corrupted_object(format!("invalid author line '{value}'"));

        // split from the right: timezone, then timestamp, then "name <email>"
        let mut parts = value.rsplitn(3, ' ');
        let timezone = parts.next().ok_or_else(invalid)?;
        let timestamp = parts
            .next()
            .and_then(|ts| ts.parse::<i64>().ok())
            .ok_or_else(invalid)?;
        let identity = parts.next().ok_or_else(invalid)?;

        let email_start = identity.find('<').ok_or_else(invalid)?;
        let email_end = identity.rfind('>').ok_or_else(invalid)?;
        if email_end < email_start {
            return Err(invalid());
        }

        let offset = parse_timezone(timezone).ok_or_else(invalid)?;
        let timestamp = DateTime::from_timestamp(timestamp, 0)
            .ok_or_else(invalid)?
            .with_timezone(&offset);

        Ok(Author {
            name: identity[..email_start].trim_end().to_string(),
            email: identity[email_start + 1..email_end].to_string(),
            timestamp,
        })
    }
}

/// Git commit object
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Commit {
    tree_oid: ObjectId,
    /// Empty for a root commit, several for a merge commit
    parents: Vec<ObjectId>,
    author: Author,
    committer: Author,
    /// Uninterpreted headers, values may span several lines
    extra_headers: Vec<(String, String)>,
    /// Message exactly as stored, including any trailing newline
    message: String,
}

impl Commit {
    pub fn new(
        parents: Vec<ObjectId>,
        tree_oid: ObjectId,
        author: Author,
        committer: Author,
        message: String,
    ) -> Self {
        Commit {
            tree_oid,
            parents,
            author,
            committer,
            extra_headers: Vec::new(),
            message,
        }
    }

    /// First line of the message
    pub fn short_message(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn tree_oid(&self) -> &ObjectId {
        &self.tree_oid
    }

    pub fn parents(&self) -> &[ObjectId] {
        &self.parents
    }

    pub fn parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn committer(&self) -> &Author {
        &self.committer
    }

    pub fn extra_headers(&self) -> &[(String, String)] {
        &self.extra_headers
    }
}

impl Packable for Commit {
    fn serialize(&self) -> Bytes {
        let mut content = String::new();

        content.push_str(&format!("tree {}\n", self.tree_oid));
        for parent in &self.parents {
            content.push_str(&format!("parent {parent}\n"));
        }
        content.push_str(&format!("author {}\n", self.author.display()));
        content.push_str(&format!("committer {}\n", self.committer.display()));
        for (key, value) in &self.extra_headers {
            // continuation lines are prefixed by a single space
            content.push_str(&format!("{key} {}\n", value.replace('\n', "\n ")));
        }
        content.push('\n');
        content.push_str(&self.message);

        Bytes::from(content)
    }
}

impl Unpackable for Commit {
    fn deserialize(content: Bytes) -> Result<Self> {
        let content = std::str::from_utf8(&content)
            .map_err(|_| Error::corrupted_object("commit is not valid UTF-8"))?;

        let (headers, message) = content
            .split_once("\n\n")
            .ok_or_else(|| Error::corrupted_object("commit has no message separator"))?;

        let mut tree_oid = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;
        let mut extra_headers: Vec<(String, String)> = Vec::new();

        for line in headers.split('\n') {
            if let Some(continuation) = line.strip_prefix(' ') {
                let (_, value) = extra_headers.last_mut().ok_or_else(|| {
                    Error::corrupted_object("continuation line without a header")
                })?;
                value.push('\n');
                value.push_str(continuation);
                continue;
            }

            let (key, value) = line
                .split_once(' ')
                .ok_or_else(|| Error::corrupted_object(format!("invalid header '{line}'")))?;

            match key {
                "tree" if tree_oid.is_none() => {
                    tree_oid = Some(parse_header_oid(value)?);
                }
                "parent" if author.is_none() => parents.push(parse_header_oid(value)?),
                "author" if author.is_none() => author = Some(Author::try_from(value)?),
                "committer" if committer.is_none() => {
                    committer = Some(Author::try_from(value)?)
                }
                _ => extra_headers.push((key.to_string(), value.to_string())),
            }
        }

        Ok(Commit {
            tree_oid: tree_oid.ok_or_else(|| Error::corrupted_object("commit has no tree"))?,
            parents,
            author: author.ok_or_else(|| Error::corrupted_object("commit has no author"))?,
            committer: committer
                .ok_or_else(|| Error::corrupted_object("commit has no committer"))?,
            extra_headers,
            message: message.to_string(),
        })
    }
}

fn parse_header_oid(value: &str) -> Result<ObjectId> {
    ObjectId::try_parse(value)
        .map_err(|_| Error::corrupted_object(format!("invalid object id '{value}' in commit")))
}

impl Object for Commit {
    fn object_type(&self) -> ObjectType {
        ObjectType::Commit
    }
}

impl std::fmt::Display for Commit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.serialize()))
    }
}
