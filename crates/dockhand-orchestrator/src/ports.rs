use dockhand_common::{PortBindingSet, PortEntry};

const DEFAULT_PROTOCOL: &str = "tcp";

/// `"<private>/<protocol>"`, the key shape used for exposed ports and bindings.
pub fn port_key(entry: &PortEntry) -> String {
    let protocol = match entry.protocol.trim() {
        "" => DEFAULT_PROTOCOL.to_string(),
        p => p.to_ascii_lowercase(),
    };
    format!("{}/{}", entry.private_port, protocol)
}

/// Derives exposed ports and host bindings from a runtime port list.
///
/// Every private-port/protocol pair becomes an exposed port. Host ports are
/// collected per pair without duplicates; pairs with no published port get no
/// bindings entry at all rather than an empty one.
pub fn project_ports(entries: &[PortEntry]) -> PortBindingSet {
    let mut set = PortBindingSet::default();

    for entry in entries {
        let key = port_key(entry);
        set.exposed_ports.insert(key.clone());

        let Some(host_port) = entry.public_port else {
            continue;
        };
        let hosts = set.bindings.entry(key).or_default();
        if !hosts.contains(&host_port) {
            hosts.push(host_port);
        }
    }

    set
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(private_port: u16, protocol: &str, public_port: Option<u16>) -> PortEntry {
        PortEntry {
            private_port,
            protocol: protocol.to_string(),
            public_port,
        }
    }

    #[test]
    fn test_groups_by_port_and_protocol() {
        // The engine lists one entry per host address family.
        let entries = vec![
            port(80, "tcp", Some(8080)),
            port(80, "tcp", Some(8080)),
            port(80, "tcp", Some(8081)),
            port(53, "udp", Some(5353)),
            port(53, "tcp", Some(5353)),
        ];

        let set = project_ports(&entries);

        assert_eq!(set.exposed_ports.len(), 3);
        assert!(set.exposed_ports.contains("80/tcp"));
        assert!(set.exposed_ports.contains("53/udp"));
        assert!(set.exposed_ports.contains("53/tcp"));
        assert_eq!(set.bindings["80/tcp"], vec![8080, 8081]);
        assert_eq!(set.bindings["53/udp"], vec![5353]);
    }

    #[test]
    fn test_unpublished_ports_are_exposed_only() {
        let entries = vec![port(9000, "tcp", None), port(9001, "tcp", Some(19001))];

        let set = project_ports(&entries);

        assert!(set.exposed_ports.contains("9000/tcp"));
        assert!(!set.bindings.contains_key("9000/tcp"));
        assert_eq!(set.bindings["9001/tcp"], vec![19001]);
    }

    #[test]
    fn test_projection_is_idempotent() {
        let entries = vec![
            port(443, "tcp", Some(443)),
            port(443, "tcp", Some(443)),
            port(8125, "udp", None),
        ];

        assert_eq!(project_ports(&entries), project_ports(&entries));
    }

    #[test]
    fn test_missing_protocol_defaults_to_tcp() {
        let set = project_ports(&[port(22, "", Some(2222))]);
        assert!(set.exposed_ports.contains("22/tcp"));
    }

    #[test]
    fn test_empty_port_list() {
        let set = project_ports(&[]);
        assert!(set.exposed_ports.is_empty());
        assert!(set.bindings.is_empty());
    }
}
