use weft_rpc_service_caller::{Endpoint, RoundRobinPicker};

fn endpoints(n: u16) -> Vec<Endpoint> {
    (0..n).map(|i| Endpoint::new("10.0.0.1", 7000 + i)).collect()
}

#[test]
fn empty_picker_yields_nothing() {
    let picker = RoundRobinPicker::new();
    assert!(picker.is_empty());
    assert!(picker.pick().is_none());
    assert!(picker.pick_first().is_none());
}

#[test]
fn rotation_visits_every_healthy_endpoint() {
    let picker = RoundRobinPicker::new();
    picker.update(endpoints(3));

    let picks: Vec<u16> = (0..6)
        .map(|_| picker.pick().unwrap().endpoint().port)
        .collect();

    assert_eq!(picks, vec![7000, 7001, 7002, 7000, 7001, 7002]);
}

#[test]
fn unhealthy_endpoints_are_skipped_without_sticking() {
    let picker = RoundRobinPicker::new();
    picker.update(endpoints(3));
    picker.mark_down(&Endpoint::new("10.0.0.1", 7001));

    let picks: Vec<u16> = (0..4)
        .map(|_| picker.pick().unwrap().endpoint().port)
        .collect();

    // 7001 never appears, and the rotation still alternates between the
    // healthy endpoints instead of locking onto one.
    assert!(!picks.contains(&7001));
    assert!(picks.contains(&7000));
    assert!(picks.contains(&7002));
}

#[test]
fn all_down_yields_none_until_marked_up() {
    let picker = RoundRobinPicker::new();
    picker.update(endpoints(2));
    picker.mark_down(&Endpoint::new("10.0.0.1", 7000));
    picker.mark_down(&Endpoint::new("10.0.0.1", 7001));

    assert!(picker.pick().is_none());

    picker.mark_up(&Endpoint::new("10.0.0.1", 7001));
    assert_eq!(picker.pick().unwrap().endpoint().port, 7001);
}

#[test]
fn update_is_a_fresh_health_view() {
    let picker = RoundRobinPicker::new();
    picker.update(endpoints(2));
    picker.mark_down(&Endpoint::new("10.0.0.1", 7000));

    // Re-resolution replaces the snapshot; everything starts healthy.
    picker.update(endpoints(2));
    let picks: Vec<u16> = (0..2)
        .map(|_| picker.pick().unwrap().endpoint().port)
        .collect();
    assert!(picks.contains(&7000));
}

#[test]
fn pick_first_prefers_the_head_of_the_list() {
    let picker = RoundRobinPicker::new();
    picker.update(endpoints(3));

    assert_eq!(picker.pick_first().unwrap().endpoint().port, 7000);
    assert_eq!(picker.pick_first().unwrap().endpoint().port, 7000);

    picker.mark_down(&Endpoint::new("10.0.0.1", 7000));
    assert_eq!(picker.pick_first().unwrap().endpoint().port, 7001);
}
