use ringcast::codec::byte::ByteKey;
use ringcast::request::{BatchRequest, KeyResult, RequestContext};
use ringcast::{Fleet, FleetConfig};

const TOPOLOGY: &str = r#"{
    "services": {
        "users": {
            "partitioning": {
                "type": "range",
                "splits": [{ "start": "m", "partition": 1 }]
            },
            "partitions": [
                [{ "uri": "node-a" }, { "uri": "node-b" }],
                [{ "uri": "node-c" }, { "uri": "node-d", "weight": 200 }]
            ]
        }
    }
}"#;

const NAMES: [&str; 8] = [
    "alice", "bob", "carol", "dave", "mallory", "oscar", "peggy", "trent",
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let fleet: Fleet<ByteKey, String> = Fleet::start(FleetConfig::from_json(TOPOLOGY)?)?;
    let client = fleet.client();
    let ctx = RequestContext::new().with_attribute("caller", "demo");
    let keys = || NAMES.iter().map(|n| ByteKey::from(*n));

    let created = client
        .send(
            "users",
            BatchRequest::update(keys().map(|k| {
                let profile = format!("profile of {}", k);
                (k, profile)
            })),
            &ctx,
        )
        .await?;
    println!("created {} users", created.len());
    for host in fleet.hosts() {
        let stored = fleet.store(host).map(|s| s.keys()).unwrap_or_default();
        println!("  {} holds {:?}", host, stored);
    }

    let fetched = client
        .send("users", BatchRequest::<ByteKey, String>::get(keys()), &ctx)
        .await?;
    for (key, result) in fetched.results() {
        match result {
            KeyResult::Entity(profile) => println!("{} => {}", key, profile),
            KeyResult::Status(status) => println!("{} => {:?}", key, status),
        }
    }

    let deleted = client
        .send("users", BatchRequest::<ByteKey, String>::delete(keys()), &ctx)
        .await?;
    println!("deleted {} users", deleted.len());
    Ok(())
}
