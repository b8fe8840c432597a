use crate::areas::repository::Repository;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::config::Identity;

impl Repository {
    /// Store a commit of `tree_oid` authored by the environment identity
    ///
    /// The message gets a trailing newline if it has none. HEAD is left
    /// alone.
    pub(crate) fn write_commit(
        &self,
        tree_oid: ObjectId,
        parents: Vec<ObjectId>,
        message: &str,
    ) -> anyhow::Result<(ObjectId, Commit)> {
        for parent in &parents {
            let kind = self.database().object_type(parent)?;
            if kind != ObjectType::Commit {
                anyhow::bail!("{} is a {kind}, not a commit", parent.to_short_oid());
            }
        }

        let identity = Identity::from_env()?;
        let mut message = message.to_string();
        if !message.ends_with('\n') {
            message.push('\n');
        }

        let commit = Commit::new(parents, tree_oid, identity.author, identity.committer, message);
        let oid = self.database().store(&commit)?;

        Ok((oid, commit))
    }
}
