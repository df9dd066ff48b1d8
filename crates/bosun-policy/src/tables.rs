//! Built-in policy tables.
//!
//! Command names are grouped by the lowest tier that admits them; the
//! tiers nest, so the medium set is `LOW + MEDIUM_EXTRA` and the high set
//! adds `HIGH_EXTRA` on top of that. Matching is by the basename of the
//! head token and is case-sensitive.

/// Read-only and informational commands, admitted at every tier.
pub const LOW_COMMANDS: &[&str] = &[
    "arch",
    "basename",
    "cal",
    "cat",
    "cksum",
    "column",
    "comm",
    "cut",
    "date",
    "df",
    "diff",
    "dig",
    "dirname",
    "dmesg",
    "du",
    "echo",
    "egrep",
    "env",
    "expr",
    "false",
    "fgrep",
    "file",
    "find",
    "findmnt",
    "finger",
    "free",
    "getent",
    "grep",
    "groups",
    "head",
    "host",
    "hostname",
    "hostnamectl",
    "id",
    "ip",
    "iostat",
    "jobs",
    "last",
    "lastlog",
    "less",
    "locale",
    "locate",
    "ls",
    "lsblk",
    "lscpu",
    "lsmem",
    "lsmod",
    "lsof",
    "lspci",
    "lsusb",
    "md5sum",
    "more",
    "mpstat",
    "netstat",
    "nl",
    "nproc",
    "nslookup",
    "numfmt",
    "od",
    "pgrep",
    "ping",
    "printenv",
    "printf",
    "ps",
    "pwd",
    "readlink",
    "realpath",
    "rev",
    "seq",
    "sha1sum",
    "sha256sum",
    "sha512sum",
    "sleep",
    "sort",
    "ss",
    "stat",
    "strings",
    "sum",
    "tac",
    "tail",
    "test",
    "timedatectl",
    "top",
    "tr",
    "traceroute",
    "true",
    "tty",
    "type",
    "uname",
    "uniq",
    "uptime",
    "vmstat",
    "w",
    "wc",
    "whereis",
    "which",
    "who",
    "whoami",
    "xxd",
    "yes",
];

/// File manipulation, archives, network clients, and development tools.
/// Admitted at medium and high.
pub const MEDIUM_EXTRA: &[&str] = &[
    "ansible",
    "apt-cache",
    "awk",
    "base64",
    "bc",
    "bunzip2",
    "bzip2",
    "cargo",
    "cc",
    "chmod",
    "clang",
    "cmake",
    "cp",
    "crontab",
    "curl",
    "dotnet",
    "dpkg-query",
    "fold",
    "fmt",
    "g++",
    "gcc",
    "gem",
    "getfacl",
    "git",
    "go",
    "gpg",
    "gradle",
    "gunzip",
    "gzip",
    "helm",
    "hexdump",
    "java",
    "javac",
    "join",
    "journalctl",
    "jq",
    "kill",
    "killall",
    "kubectl",
    "ln",
    "loginctl",
    "make",
    "mkdir",
    "mktemp",
    "mv",
    "mvn",
    "mysql",
    "nice",
    "node",
    "nohup",
    "npm",
    "npx",
    "openssl",
    "paste",
    "patch",
    "perl",
    "php",
    "pip",
    "pip3",
    "pkill",
    "psql",
    "python",
    "python3",
    "redis-cli",
    "renice",
    "rm",
    "rmdir",
    "rpm",
    "rsync",
    "ruby",
    "rustc",
    "scp",
    "screen",
    "sed",
    "sftp",
    "shuf",
    "snap",
    "split",
    "sqlite3",
    "ssh",
    "stty",
    "svn",
    "systemctl",
    "tar",
    "tee",
    "terraform",
    "timeout",
    "tmux",
    "touch",
    "unxz",
    "unzip",
    "watch",
    "wget",
    "xargs",
    "xz",
    "yarn",
    "zcat",
    "zip",
];

/// Administrative commands, admitted only at high.
pub const HIGH_EXTRA: &[&str] = &[
    "apachectl",
    "apt",
    "apt-get",
    "blkid",
    "certbot",
    "chattr",
    "chgrp",
    "chown",
    "chpasswd",
    "chroot",
    "depmod",
    "dnf",
    "docker",
    "docker-compose",
    "dpkg",
    "e2fsck",
    "ethtool",
    "firewall-cmd",
    "fsck",
    "groupadd",
    "groupdel",
    "groupmod",
    "hdparm",
    "ifconfig",
    "insmod",
    "ip6tables",
    "iptables",
    "ldconfig",
    "losetup",
    "ltrace",
    "lvdisplay",
    "lvs",
    "modinfo",
    "modprobe",
    "mount",
    "nft",
    "nginx",
    "pacman",
    "passwd",
    "podman",
    "pvdisplay",
    "pvs",
    "rmmod",
    "route",
    "service",
    "setfacl",
    "smartctl",
    "strace",
    "swapoff",
    "swapon",
    "sysctl",
    "tc",
    "tcpdump",
    "tune2fs",
    "ufw",
    "umount",
    "update-alternatives",
    "useradd",
    "userdel",
    "usermod",
    "vgdisplay",
    "vgs",
    "yum",
    "zfs",
    "zpool",
    "zypper",
];

/// Command names denied at every tier, including high.
pub const ALWAYS_DENIED: &[&str] = &[
    "blkdiscard",
    "cfdisk",
    "dd",
    "fdisk",
    "gdisk",
    "halt",
    "init",
    "mkfs",
    "mkswap",
    "parted",
    "poweroff",
    "reboot",
    "sgdisk",
    "shred",
    "shutdown",
    "su",
    "telinit",
    "vigr",
    "vipw",
    "wipefs",
];

/// Patterns rejected at every tier, matched against the full command.
pub const ALWAYS_FORBIDDEN_PATTERNS: &[&str] = &[
    r"rm\s+-(?:rf|fr)\s+/(?:\s|$|\*)",
    r"dd\s+if=.*of=/dev/",
    r"mkfs\.",
    r":\(\)\s*\{",
    r">\s*/dev/sd",
    r"chmod\s+(?:-[a-zA-Z]+\s+)*777\s+/\s*$",
    r"(?:curl|wget)[^|;]*\|\s*(?:ba|z|da)?sh\b",
];

/// Patterns rejected at the low tier: no chaining, no redirection, no
/// substitution, no sudo anywhere in the line.
pub const LOW_FORBIDDEN_PATTERNS: &[&str] = &[
    r"&&",
    r"\|\|",
    r"\|",
    r";",
    r"`",
    r"\$\(",
    r">>",
    r">",
    r"<",
    r"\bsudo\b",
];

/// Patterns rejected at the medium tier. A single `|` is absent here:
/// pipes between allowed heads are checked structurally instead.
pub const MEDIUM_FORBIDDEN_PATTERNS: &[&str] = &[
    r"&&",
    r"\|\|",
    r";",
    r"`",
    r"\$\(",
    r">>",
    r">",
    r"<",
    r"\bsudo\b",
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn no_name_is_both_allowed_and_always_denied() {
        let denied: HashSet<&str> = ALWAYS_DENIED.iter().copied().collect();
        for name in LOW_COMMANDS
            .iter()
            .chain(MEDIUM_EXTRA.iter())
            .chain(HIGH_EXTRA.iter())
        {
            assert!(!denied.contains(name), "{name} is allowed and always denied");
        }
    }

    #[test]
    fn tier_tables_are_disjoint() {
        let low: HashSet<&str> = LOW_COMMANDS.iter().copied().collect();
        let medium: HashSet<&str> = MEDIUM_EXTRA.iter().copied().collect();
        for name in MEDIUM_EXTRA {
            assert!(!low.contains(name), "{name} duplicated in low and medium");
        }
        for name in HIGH_EXTRA {
            assert!(
                !low.contains(name) && !medium.contains(name),
                "{name} duplicated across tiers"
            );
        }
    }

    #[test]
    fn tables_hold_roughly_the_documented_volume() {
        let total = LOW_COMMANDS.len() + MEDIUM_EXTRA.len() + HIGH_EXTRA.len();
        assert!(total >= 220, "expected 220+ allowed names, found {total}");
    }
}
