// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios spanning real kitchen/controller/conveyor/robot
//! processes, talking only over the gRPC surfaces they expose to each
//! other.

use std::time::Duration;

use kitchen_controller::proto::{GetCountersRequest, ListRemoteRobotsRequest, PlaceRandomOrderRequest};
use kitchen_specs::{Cluster, RobotSpec};

const TIMEOUT: Duration = Duration::from_secs(20);

#[tokio::test]
async fn cluster_boots_with_zero_counters_and_discovers_its_robot() -> anyhow::Result<()> {
    let cluster = Cluster::start(&[RobotSpec { position: 1, capabilities_file: "capabilities_3.json" }]).await?;

    let counters = cluster.kitchen_client().await?.get_counters(GetCountersRequest {}).await?.into_inner();
    assert_eq!(counters.received_orders, 0);
    assert_eq!(counters.assigned_orders, 0);
    assert_eq!(counters.dropped_orders, 0);
    assert_eq!(counters.completed_orders, 0);

    cluster.wait_for_robot_membership(1, TIMEOUT).await?;

    let robots = cluster
        .kitchen_client()
        .await?
        .list_remote_robots(ListRemoteRobotsRequest {})
        .await?
        .into_inner();
    assert_eq!(robots.robots.len(), 1);
    assert_eq!(robots.robots[0].position, 1);
    assert!(robots.robots[0].connectivity);

    Ok(())
}

/// A single generalist robot is capable of every action in every recipe, so
/// whichever recipe `place_random_order` draws finishes in one round with no
/// handover (spec's "single robot, single recipe" seed scenario).
#[tokio::test]
async fn single_generalist_robot_completes_any_order() -> anyhow::Result<()> {
    let cluster = Cluster::start(&[RobotSpec { position: 1, capabilities_file: "capabilities_3.json" }]).await?;
    cluster.wait_for_robot_membership(1, TIMEOUT).await?;

    cluster.kitchen_client().await?.place_random_order(PlaceRandomOrderRequest {}).await?;

    let counters = cluster
        .wait_for_counters(TIMEOUT, |c| c.completed_orders + c.dropped_orders >= 1)
        .await?;
    assert_eq!(counters.received_orders, 1);
    assert_eq!(counters.completed_orders, 1, "the capable robot should finish the dish, not drop it");
    assert_eq!(counters.dropped_orders, 0);

    Ok(())
}

/// Robot 1 covers every recipe's capable prefix and robot 2 covers
/// everything after it, so any randomly drawn recipe requires exactly one
/// handover between the two and still finishes (spec's "handover across two
/// robots" seed scenario).
#[tokio::test]
async fn two_robots_hand_over_and_complete_any_order() -> anyhow::Result<()> {
    let cluster = Cluster::start(&[
        RobotSpec { position: 1, capabilities_file: "capabilities_1.json" },
        RobotSpec { position: 2, capabilities_file: "capabilities_2.json" },
    ])
    .await?;
    cluster.wait_for_robot_membership(2, TIMEOUT).await?;

    cluster.kitchen_client().await?.place_random_order(PlaceRandomOrderRequest {}).await?;

    let counters = cluster
        .wait_for_counters(TIMEOUT, |c| c.completed_orders + c.dropped_orders >= 1)
        .await?;
    assert_eq!(counters.received_orders, 1);
    assert_eq!(counters.completed_orders, 1, "the order should hand over between robots, not drop");
    assert_eq!(counters.dropped_orders, 0);
    assert!(counters.assigned_orders >= 1, "at least the first leg should have been assigned");

    Ok(())
}

/// With no robot in the membership at all, the controller can never find a
/// candidate and the order is dropped the moment the kitchen's gate forwards
/// it (spec's "no capable robot" seed scenario).
#[tokio::test]
async fn order_with_no_robots_present_is_dropped() -> anyhow::Result<()> {
    let cluster = Cluster::start(&[]).await?;

    cluster.kitchen_client().await?.place_random_order(PlaceRandomOrderRequest {}).await?;

    let counters = cluster
        .wait_for_counters(TIMEOUT, |c| c.dropped_orders + c.completed_orders >= 1)
        .await?;
    assert_eq!(counters.received_orders, 1);
    assert_eq!(counters.dropped_orders, 1);
    assert_eq!(counters.completed_orders, 0);
    assert_eq!(counters.assigned_orders, 0);

    Ok(())
}

/// Five orders placed back-to-back are all accepted by the kitchen
/// immediately (`received_orders` jumps to 5 right away), but the admission
/// gate releases them to the controller one at a time. Conservation (spec
/// §8: `received == assigned + dropped + in_flight`) must hold at every
/// point in between, and every order eventually resolves instead of
/// wedging in flight.
#[tokio::test]
async fn back_to_back_orders_are_rate_limited_and_conserve() -> anyhow::Result<()> {
    let cluster = Cluster::start(&[
        RobotSpec { position: 1, capabilities_file: "capabilities_1.json" },
        RobotSpec { position: 2, capabilities_file: "capabilities_2.json" },
    ])
    .await?;
    cluster.wait_for_robot_membership(2, TIMEOUT).await?;

    let mut kitchen = cluster.kitchen_client().await?;
    const ORDER_COUNT: u32 = 5;
    for _ in 0..ORDER_COUNT {
        kitchen.place_random_order(PlaceRandomOrderRequest {}).await?;
    }

    let immediate = kitchen.get_counters(GetCountersRequest {}).await?.into_inner();
    assert_eq!(immediate.received_orders, ORDER_COUNT, "the kitchen accepts every call up front");

    let resolved = cluster
        .wait_for_counters(TIMEOUT, |c| c.assigned_orders + c.dropped_orders >= ORDER_COUNT)
        .await?;
    assert_eq!(resolved.received_orders, ORDER_COUNT);
    assert_eq!(
        resolved.assigned_orders + resolved.dropped_orders,
        ORDER_COUNT,
        "conservation: every received order is eventually assigned or dropped"
    );

    let finished = cluster
        .wait_for_counters(TIMEOUT, |c| c.completed_orders + c.dropped_orders >= ORDER_COUNT)
        .await?;
    assert_eq!(
        finished.completed_orders + finished.dropped_orders,
        ORDER_COUNT,
        "every assigned order eventually completes since both robots together cover every recipe"
    );

    Ok(())
}
