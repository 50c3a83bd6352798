//! Thread-id syntax and selector resolution.
//!
//! Every process has exactly one thread and its tid equals its pid, so a
//! thread id `p<pid>.<tid>` is only meaningful when `tid` is `-1`, `0` or the
//! pid itself.

use nemul_vm::{Pid, ProcessTable};

/// One component of a thread id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSel {
    /// `-1`
    All,
    /// `0`
    Any,
    Id(u32),
}

impl IdSel {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "-1" => Some(IdSel::All),
            "0" => Some(IdSel::Any),
            _ => match u32::from_str_radix(s, 16).ok()? {
                0 => Some(IdSel::Any),
                id => Some(IdSel::Id(id)),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadId {
    pub pid: IdSel,
    pub tid: IdSel,
}

/// What a thread id refers to after resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    All,
    Pid(Pid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    /// `0` was given and no process is alive.
    NoProcess,
    /// The tid does not name the pid's only thread.
    BadThread,
}

impl ThreadId {
    /// Parse `p<pid>.<tid>`, `p<pid>` or a bare `<tid>`. Numbers are hex.
    pub fn parse(s: &str) -> Option<Self> {
        if let Some(rest) = s.strip_prefix('p') {
            return match rest.split_once('.') {
                Some((pid, tid)) => Some(ThreadId {
                    pid: IdSel::parse(pid)?,
                    tid: IdSel::parse(tid)?,
                }),
                None => Some(ThreadId {
                    pid: IdSel::parse(rest)?,
                    tid: IdSel::All,
                }),
            };
        }
        // A bare tid names the process whose only thread it is.
        let tid = IdSel::parse(s)?;
        Some(ThreadId { pid: tid, tid })
    }

    pub fn resolve(&self, table: &ProcessTable) -> Result<Target, ResolveError> {
        let target = match self.pid {
            IdSel::All => Target::All,
            IdSel::Any => Target::Pid(table.highest_alive_pid().ok_or(ResolveError::NoProcess)?),
            IdSel::Id(pid) => Target::Pid(pid),
        };
        match (target, self.tid) {
            (_, IdSel::All | IdSel::Any) => Ok(target),
            (Target::Pid(pid), IdSel::Id(tid)) if tid == pid => Ok(target),
            _ => Err(ResolveError::BadThread),
        }
    }
}

impl Target {
    pub fn matches(self, pid: Pid) -> bool {
        match self {
            Target::All => true,
            Target::Pid(p) => p == pid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_forms() {
        assert_eq!(
            ThreadId::parse("p11.11"),
            Some(ThreadId {
                pid: IdSel::Id(0x11),
                tid: IdSel::Id(0x11)
            })
        );
        assert_eq!(
            ThreadId::parse("p-1.-1"),
            Some(ThreadId {
                pid: IdSel::All,
                tid: IdSel::All
            })
        );
        assert_eq!(
            ThreadId::parse("p1"),
            Some(ThreadId {
                pid: IdSel::Id(1),
                tid: IdSel::All
            })
        );
        assert_eq!(
            ThreadId::parse("0"),
            Some(ThreadId {
                pid: IdSel::Any,
                tid: IdSel::Any
            })
        );
        assert_eq!(ThreadId::parse("pz.1"), None);
        assert_eq!(ThreadId::parse(""), None);
    }

    #[test]
    fn resolution() {
        let mut table = ProcessTable::new();
        let child = table.fork(1).unwrap();

        let any = ThreadId::parse("0").unwrap();
        assert_eq!(any.resolve(&table), Ok(Target::Pid(child)));

        let all = ThreadId::parse("-1").unwrap();
        assert_eq!(all.resolve(&table), Ok(Target::All));

        let mismatched = ThreadId::parse("p1.2").unwrap();
        assert_eq!(mismatched.resolve(&table), Err(ResolveError::BadThread));

        table.find_mut(1).unwrap().exit(0);
        table.find_mut(child).unwrap().exit(0);
        assert_eq!(any.resolve(&table), Err(ResolveError::NoProcess));
    }
}
