//! Seeded baseline configurations for simulated mode.
//!
//! Three profiles: a hardened core router, a weak access switch (default
//! SNMP community, no console timeout, telnet enabled), and a hardened edge
//! firewall. The compliance handler and the audit tests run against these.

/// Device configs seeded when running simulated.
pub fn demo_configs() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "router-core-1",
            "\
hostname router-core-1
!
service password-encryption
ip ssh version 2
!
aaa new-model
aaa authentication login default local
!
ntp server 10.0.0.100
logging host 10.0.0.200
!
snmp-server community NetOps$ecure RO
!
banner login ^C
*** AUTHORIZED ACCESS ONLY ***
^C
!
line con 0
 exec-timeout 5 0
line vty 0 15
 access-class ACL_VTY in
 transport input ssh
",
        ),
        (
            "switch-access-1",
            "\
hostname switch-access-1
!
ip ssh version 2
!
snmp-server community public RO
!
ntp server 10.0.0.100
!
line con 0
 no exec-timeout
line vty 0 15
 transport input ssh telnet
",
        ),
        (
            "firewall-edge-1",
            "\
hostname firewall-edge-1
!
service password-encryption
ip ssh version 2
!
aaa authentication login default local
!
ntp server 10.0.0.100
ntp server 10.0.0.101
logging host 10.0.0.200
logging host 10.0.0.201
!
snmp-server community FW$nmp! RO
!
banner login ^C
*** AUTHORIZED ACCESS ONLY - ALL ACTIVITY MONITORED ***
^C
!
line con 0
 exec-timeout 3 0
line vty 0 4
 access-class ACL_MGMT in
 transport input ssh
",
        ),
    ]
}

/// Look up one demo config by device name.
pub fn demo_config(device_id: &str) -> Option<&'static str> {
    demo_configs()
        .into_iter()
        .find(|(id, _)| *id == device_id)
        .map(|(_, config)| config)
}
