mod common;

use chrono::TimeDelta;
use std::sync::Arc;

use common::{InventoryBuilder, ScriptedTransport, StubResolver, ip, mac, run_context, run_start};
use porthistory::database::{Assignment, MacOnPortRecord, MacSearch, queries};
use porthistory::{MacAddress, PollError, Principal, RunContext, RunReport, run_mac_on_ports};

const SW1: &str = "10.0.0.2";
const SW2: &str = "10.0.0.3";
const R1: &str = "10.0.0.1";
const VLAN_ID: i64 = 100;
const VID: u16 = 10;

const MAC_A: &str = "00:16:3a:00:00:0a";
const MAC_B: &str = "00:16:3a:00:00:0b";
const MAC_C: &str = "00:50:56:00:00:0c";
const MAC_D: &str = "00:16:3a:00:00:0d";

struct Fixture {
    ctx: RunContext,
    transport: Arc<ScriptedTransport>,
    resolver: Arc<StubResolver>,
}

/// Two access switches joined by a trunk on Gi1/0/48, one router, one
/// flagged VLAN with 10.1.10.0/24 and one unflagged VLAN.
fn fixture() -> Fixture {
    let inventory = InventoryBuilder::new()
        .switch(1, "sw1", "hq", SW1)
        .interface(11, 1, "GigabitEthernet1/0/1")
        .interface(12, 1, "GigabitEthernet1/0/2")
        .ignored_interface(14, 1, "GigabitEthernet1/0/47")
        .interface(13, 1, "GigabitEthernet1/0/48")
        .switch(2, "sw2", "hq", SW2)
        .interface(21, 2, "GigabitEthernet1/0/1")
        .interface(22, 2, "GigabitEthernet1/0/2")
        .interface(23, 2, "GigabitEthernet1/0/48")
        .router(3, "r1", "hq", R1)
        .interface(31, 3, "GigabitEthernet0/0/1")
        .cable(("sw1", "GigabitEthernet1/0/48"), ("sw2", "GigabitEthernet1/0/48"))
        .cable(("r1", "GigabitEthernet0/0/1"), ("sw2", "GigabitEthernet1/0/2"))
        .vlan(VLAN_ID, VID, "hq", true)
        .vlan(101, 20, "hq", false)
        .prefix("10.1.10.0/24", VLAN_ID)
        .prefix("10.1.20.0/24", 101)
        .build();

    let transport = Arc::new(ScriptedTransport::new());
    transport.if_names(ip(SW1), &[(1, "Gi1/0/1"), (2, "Gi1/0/2"), (47, "Gi1/0/47"), (48, "Gi1/0/48")]);
    transport.if_names(ip(SW2), &[(1, "Gi1/0/1"), (2, "Gi1/0/2"), (48, "Gi1/0/48")]);
    transport.bridge_ports(ip(SW1), VID, &[(1, 1), (2, 2), (47, 47), (48, 48)]);
    transport.bridge_ports(ip(SW2), VID, &[(1, 1), (2, 2), (48, 48)]);
    transport.forwarding(ip(SW1), VID, &[(mac(MAC_A), 1), (mac(MAC_B), 48), (mac(MAC_C), 47)]);
    transport.forwarding(ip(SW2), VID, &[(mac(MAC_B), 1), (mac(MAC_A), 48)]);
    transport.arp(
        ip(R1),
        &[
            (ip("10.1.10.5"), mac(MAC_A)),
            (ip("10.1.10.6"), mac(MAC_B)),
            (ip("192.168.50.9"), mac(MAC_C)),
        ],
    );

    let resolver = Arc::new(StubResolver::new(&[("10.1.10.5", "pc-a.example.net")]));
    let ctx = run_context(inventory, transport.clone(), resolver.clone());

    Fixture {
        ctx,
        transport,
        resolver,
    }
}

fn admin() -> Principal {
    Principal::new("admin", true)
}

async fn run(ctx: &RunContext) -> RunReport {
    run_mac_on_ports(ctx, &admin(), Some("hq"))
        .await
        .expect("job should run")
        .expect("admin is authorized")
}

async fn run_later(ctx: &RunContext, hours: i64) -> RunReport {
    run(&ctx.clone().with_now(run_start() + TimeDelta::hours(hours))).await
}

fn record(ctx: &RunContext, raw: &str) -> Option<MacOnPortRecord> {
    let conn = ctx.db.lock().expect("db lock");
    queries::get_mac_on_port(&conn, VLAN_ID, mac(raw)).expect("query MAC on port")
}

fn notes(report: &RunReport, prefix: &str) -> Vec<String> {
    report
        .blocks()
        .iter()
        .flat_map(|b| b.notes.iter())
        .filter(|n| n.starts_with(prefix))
        .cloned()
        .collect()
}

#[tokio::test]
async fn first_run_attributes_macs_to_access_ports() {
    let fx = fixture();
    let report = run(&fx.ctx).await;

    assert_eq!(report.totals().created, 2);
    assert_eq!(report.block("sw1").unwrap().macs, 1);
    assert_eq!(report.block("sw2").unwrap().macs, 1);

    let a = record(&fx.ctx, MAC_A).expect("A recorded");
    assert_eq!(a.interface_id, 11);
    assert_eq!(a.device_name, "sw1");
    assert_eq!(a.vid, VID);
    assert_eq!(a.ip_address, Some(ip("10.1.10.5")));
    assert_eq!(a.dns_name.as_deref(), Some("pc-a.example.net"));
    assert_eq!(a.updated, run_start());

    let b = record(&fx.ctx, MAC_B).expect("B recorded");
    assert_eq!(b.interface_name, "GigabitEthernet1/0/1");
    assert_eq!(b.device_name, "sw2");
    assert_eq!(b.ip_address, Some(ip("10.1.10.6")));
    assert_eq!(b.dns_name.as_deref(), Some(""));

    // Learned only on a port flagged to ignore MACs
    assert!(record(&fx.ctx, MAC_C).is_none());

    let conn = fx.ctx.db.lock().unwrap();
    let address = queries::get_ip_address(&conn, ip("10.1.10.5")).unwrap().unwrap();
    assert_eq!(address.prefix_length, 24);
    assert_eq!(address.assignment, Assignment::Static);
    assert_eq!(address.dns_name, "pc-a.example.net");
    assert!(queries::get_ip_address(&conn, ip("192.168.50.9")).unwrap().is_none());
}

#[tokio::test]
async fn trunk_ports_are_never_polled_into_records() {
    let fx = fixture();
    run(&fx.ctx).await;

    let conn = fx.ctx.db.lock().unwrap();
    assert!(queries::mac_on_ports_for_interface(&conn, 13).unwrap().is_empty());
    assert!(queries::mac_on_ports_for_interface(&conn, 23).unwrap().is_empty());
    assert!(queries::mac_on_ports_for_interface(&conn, 14).unwrap().is_empty());
}

#[tokio::test]
async fn unchanged_network_writes_nothing() {
    let fx = fixture();
    run(&fx.ctx).await;

    let report = run_later(&fx.ctx, 1).await;
    assert_eq!(report.totals().mutations(), 0);
    assert_eq!(record(&fx.ctx, MAC_A).unwrap().updated, run_start());
}

#[tokio::test]
async fn moved_port_is_reported_once() {
    let fx = fixture();
    run(&fx.ctx).await;

    fx.transport
        .forwarding(ip(SW1), VID, &[(mac(MAC_A), 2), (mac(MAC_B), 48)]);
    let report = run_later(&fx.ctx, 1).await;

    let totals = report.totals();
    assert_eq!(totals.moved_port, 1);
    assert_eq!(totals.updated, 1);
    assert_eq!(totals.created, 0);
    assert_eq!(totals.deleted, 0);
    assert_eq!(
        notes(&report, "moved port"),
        vec!["moved port: 00163A00000A vlan 10 sw1 GigabitEthernet1/0/1 -> sw1 GigabitEthernet1/0/2"]
    );

    let a = record(&fx.ctx, MAC_A).unwrap();
    assert_eq!(a.interface_id, 12);
    assert_eq!(a.ip_address, Some(ip("10.1.10.5")));
    assert_eq!(a.updated, run_start() + TimeDelta::hours(1));
}

#[tokio::test]
async fn mac_moving_to_another_switch_is_a_move() {
    let fx = fixture();
    run(&fx.ctx).await;

    fx.transport.forwarding(ip(SW1), VID, &[(mac(MAC_B), 48)]);
    fx.transport
        .forwarding(ip(SW2), VID, &[(mac(MAC_B), 1), (mac(MAC_A), 2)]);
    let report = run_later(&fx.ctx, 1).await;

    let totals = report.totals();
    assert_eq!(totals.moved_port, 1);
    assert_eq!(totals.deleted, 0);
    assert_eq!(totals.created, 0);

    let a = record(&fx.ctx, MAC_A).unwrap();
    assert_eq!(a.device_name, "sw2");
    assert_eq!(a.interface_id, 22);
}

#[tokio::test]
async fn stale_mac_on_observed_port_is_deleted() {
    let fx = fixture();
    run(&fx.ctx).await;

    fx.transport
        .forwarding(ip(SW2), VID, &[(mac(MAC_D), 1), (mac(MAC_A), 48)]);
    let report = run_later(&fx.ctx, 1).await;

    let sw2 = report.block("sw2").unwrap();
    assert_eq!(sw2.counters.deleted, 1);
    assert_eq!(sw2.counters.created, 1);
    assert!(record(&fx.ctx, MAC_B).is_none());

    let d = record(&fx.ctx, MAC_D).expect("D recorded");
    assert_eq!(d.interface_id, 21);
    assert_eq!(d.ip_address, None);
}

#[tokio::test]
async fn unreachable_switch_changes_nothing() {
    let fx = fixture();
    run(&fx.ctx).await;

    fx.transport
        .fail_host(ip(SW2), PollError::Unreachable("no route to host".to_string()));
    let report = run_later(&fx.ctx, 1).await;

    assert_eq!(report.totals().mutations(), 0);
    assert!(report.block("sw2").unwrap().skipped.is_some());
    let b = record(&fx.ctx, MAC_B).expect("B kept");
    assert_eq!(b.interface_id, 21);
    assert_eq!(b.updated, run_start());
}

#[tokio::test]
async fn missing_address_keeps_the_stored_one() {
    let fx = fixture();
    run(&fx.ctx).await;

    fx.transport.fail_host(ip(R1), PollError::Timeout);
    fx.resolver.clear();
    let report = run_later(&fx.ctx, 1).await;

    assert_eq!(report.totals().mutations(), 0);
    assert_eq!(report.totals().moved_ip, 0);
    assert_eq!(report.block("r1").unwrap().skipped.as_deref(), Some("timeout"));

    let a = record(&fx.ctx, MAC_A).unwrap();
    assert_eq!(a.ip_address, Some(ip("10.1.10.5")));
    assert_eq!(a.dns_name.as_deref(), Some("pc-a.example.net"));
}

#[tokio::test]
async fn moved_address_is_noted() {
    let fx = fixture();
    run(&fx.ctx).await;

    fx.transport
        .arp(ip(R1), &[(ip("10.1.10.7"), mac(MAC_A)), (ip("10.1.10.6"), mac(MAC_B))]);
    let report = run_later(&fx.ctx, 1).await;

    let totals = report.totals();
    assert_eq!(totals.moved_ip, 1);
    assert_eq!(totals.moved_port, 0);
    assert_eq!(totals.updated, 1);
    assert_eq!(
        notes(&report, "moved ip"),
        vec!["moved ip: 00163A00000A vlan 10 10.1.10.5 -> 10.1.10.7"]
    );
    assert_eq!(record(&fx.ctx, MAC_A).unwrap().ip_address, Some(ip("10.1.10.7")));
}

#[tokio::test]
async fn dns_name_is_refreshed_but_never_blanked() {
    let fx = fixture();
    run(&fx.ctx).await;

    fx.resolver.clear();
    run_later(&fx.ctx, 1).await;
    assert_eq!(
        record(&fx.ctx, MAC_A).unwrap().dns_name.as_deref(),
        Some("pc-a.example.net")
    );

    fx.resolver.set("10.1.10.5", "desk-12.example.net");
    fx.resolver.set("10.1.10.6", "printer.example.net");
    run_later(&fx.ctx, 2).await;

    let conn = fx.ctx.db.lock().unwrap();
    let a = queries::get_ip_address(&conn, ip("10.1.10.5")).unwrap().unwrap();
    assert_eq!(a.dns_name, "desk-12.example.net");
    assert_eq!(a.assignment, Assignment::Static);
    let b = queries::get_ip_address(&conn, ip("10.1.10.6")).unwrap().unwrap();
    assert_eq!(b.dns_name, "printer.example.net");
}

#[tokio::test]
async fn search_filters_stored_records() {
    let fx = fixture();
    run(&fx.ctx).await;

    let conn = fx.ctx.db.lock().unwrap();
    let search = |search: MacSearch| -> Vec<MacAddress> {
        queries::search_mac_on_ports(&conn, &search)
            .expect("search should succeed")
            .into_iter()
            .map(|r| r.mac)
            .collect()
    };

    assert_eq!(
        search(MacSearch {
            query: Some("00:16:3a".to_string()),
            ..MacSearch::default()
        }),
        vec![mac(MAC_A), mac(MAC_B)]
    );
    assert_eq!(
        search(MacSearch {
            query: Some("0016.3a00.000a".to_string()),
            ..MacSearch::default()
        }),
        vec![mac(MAC_A)]
    );
    assert_eq!(
        search(MacSearch {
            device: Some("sw2".to_string()),
            ..MacSearch::default()
        }),
        vec![mac(MAC_B)]
    );
    assert!(
        search(MacSearch {
            vid: Some(20),
            ..MacSearch::default()
        })
        .is_empty()
    );
    assert_eq!(
        search(MacSearch {
            site: Some("hq".to_string()),
            vid: Some(VID),
            ..MacSearch::default()
        })
        .len(),
        2
    );
}

#[tokio::test]
async fn refused_principal_runs_nothing() {
    let fx = fixture();

    let outcome = run_mac_on_ports(&fx.ctx, &Principal::new("guest", false), None)
        .await
        .expect("refusal is not an error");

    assert!(outcome.is_none());
    assert_eq!(fx.transport.calls(), 0);
    assert!(record(&fx.ctx, MAC_A).is_none());
}
