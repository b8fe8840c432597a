use crate::areas::database::Database;
use crate::areas::refs::Refs;
use crate::artifacts::objects::OBJECT_ID_LENGTH;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;

const PARENT_REGEX: &str = r"^(.+)\^$";
const ANCESTOR_REGEX: &str = r"^(.+)\~(\d+)$";
const REF_ALIASES: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "@" => "HEAD",
};

/// Shortest abbreviated object id accepted
pub const MIN_PREFIX_LENGTH: usize = 4;

/// A name for an object as typed on the command line
///
/// Supports:
/// - `HEAD`, `@` and branch names (`master`, `refs/heads/master`)
/// - full and abbreviated (at least 4 hex characters) object ids, tried
///   when no reference of that name exists
/// - `<rev>^` for the first parent and `<rev>~<n>` for the n-th ancestor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revision {
    Ref(String),
    Parent(Box<Revision>),
    Ancestor(Box<Revision>, usize),
}

impl Revision {
    pub fn try_parse(revision: &str) -> anyhow::Result<Revision> {
        if revision.is_empty() {
            anyhow::bail!("empty revision");
        }

        let parent_regex = regex::Regex::new(PARENT_REGEX)
            .with_context(|| format!("invalid parent regex: {PARENT_REGEX}"))?;
        if let Some(caps) = parent_regex.captures(revision) {
            return Ok(Revision::Parent(Box::new(Self::try_parse(&caps[1])?)));
        }

        let ancestor_regex = regex::Regex::new(ANCESTOR_REGEX)
            .with_context(|| format!("invalid ancestor regex: {ANCESTOR_REGEX}"))?;
        if let Some(caps) = ancestor_regex.captures(revision) {
            let generations = caps[2]
                .parse()
                .with_context(|| format!("failed to parse generations in revision: {revision}"))?;
            return Ok(Revision::Ancestor(
                Box::new(Self::try_parse(&caps[1])?),
                generations,
            ));
        }

        let name = REF_ALIASES.get(revision).copied().unwrap_or(revision);
        Ok(Revision::Ref(name.to_string()))
    }

    /// Object the revision names
    pub fn resolve(&self, refs: &Refs, database: &Database) -> anyhow::Result<ObjectId> {
        match self {
            Revision::Ref(name) => Self::resolve_name(name, refs, database),
            Revision::Parent(base) => Self::commit_parent(base.resolve(refs, database)?, database),
            Revision::Ancestor(base, generations) => {
                let mut oid = base.resolve(refs, database)?;
                for _ in 0..*generations {
                    oid = Self::commit_parent(oid, database)?;
                }
                Ok(oid)
            }
        }
    }

    fn resolve_name(name: &str, refs: &Refs, database: &Database) -> anyhow::Result<ObjectId> {
        if let Some(oid) = refs.read_ref(name)? {
            return Ok(oid);
        }

        if !Self::looks_like_oid(name) {
            anyhow::bail!("ambiguous argument '{name}': unknown revision or path not in the working tree");
        }
        if name.len() == OBJECT_ID_LENGTH {
            return Ok(ObjectId::try_parse(name)?);
        }

        let matches = database.find_objects_by_prefix(name)?;
        match matches.as_slice() {
            [] => anyhow::bail!(
                "ambiguous argument '{name}': unknown revision or path not in the working tree"
            ),
            [oid] => Ok(*oid),
            candidates => {
                let mut message = format!("short object id {name} is ambiguous\nhint: The candidates are:");
                for oid in candidates {
                    let kind = database
                        .object_type(oid)
                        .map(|kind| kind.as_str())
                        .unwrap_or("unknown");
                    message.push_str(&format!("\nhint:   {} {kind}", oid.to_short_oid()));
                }
                anyhow::bail!(message)
            }
        }
    }

    fn commit_parent(oid: ObjectId, database: &Database) -> anyhow::Result<ObjectId> {
        let kind = database.object_type(&oid)?;
        if kind != ObjectType::Commit {
            anyhow::bail!("object {} is a {kind}, not a commit", oid.to_short_oid());
        }

        database
            .load_commit(&oid)?
            .parent()
            .copied()
            .with_context(|| format!("commit {} has no parent", oid.to_short_oid()))
    }

    fn looks_like_oid(name: &str) -> bool {
        (MIN_PREFIX_LENGTH..=OBJECT_ID_LENGTH).contains(&name.len())
            && name.chars().all(|c| c.is_ascii_hexdigit())
    }
}
