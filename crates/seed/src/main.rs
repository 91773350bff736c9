//! Populate a database with an administrator and a set of demo members.
//!
//! Safe to run repeatedly: accounts whose email already exists are kept, and
//! any profile or subscription an earlier interrupted run did not get to is
//! filled in.

use anyhow::Context;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::Argon2;
use chrono::NaiveDate;
use kindred_core::roles::{ROLE_ADMIN, ROLE_MEMBER};
use kindred_db::models::profile::UpsertProfile;
use kindred_db::models::user::CreateUser;
use kindred_db::repositories::{ProfileRepo, RoleRepo, SubscriptionRepo, UserRepo};
use kindred_db::DbPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_ADMIN_EMAIL: &str = "admin@kindred.local";
const DEFAULT_DEMO_USERS: u32 = 20;
const DEFAULT_DEMO_PASSWORD: &str = "kindred-demo-password";

const NAMES: [&str; 12] = [
    "Ada", "Bruno", "Carmen", "Dario", "Elena", "Filipe", "Greta", "Hugo", "Iris", "Joao",
    "Kiara", "Luca",
];

const CITIES: [(&str, f64, f64); 4] = [
    ("Lisbon", 38.7223, -9.1393),
    ("Porto", 41.1579, -8.6291),
    ("Coimbra", 40.2033, -8.4103),
    ("Braga", 41.5454, -8.4265),
];

const INTERESTS: [&str; 8] = [
    "hiking", "jazz", "cooking", "chess", "surfing", "films", "running", "painting",
];

const GENDERS: [&str; 3] = ["woman", "man", "nonbinary"];

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "kindred_seed=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = ?e, "Seeding failed");
        eprintln!("kindred-seed: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let admin_email = std::env::var("SEED_ADMIN_EMAIL")
        .unwrap_or_else(|_| DEFAULT_ADMIN_EMAIL.into())
        .trim()
        .to_lowercase();
    let admin_password =
        std::env::var("SEED_ADMIN_PASSWORD").context("SEED_ADMIN_PASSWORD must be set")?;
    let demo_users: u32 = match std::env::var("SEED_DEMO_USERS") {
        Ok(v) => v
            .trim()
            .parse()
            .with_context(|| format!("SEED_DEMO_USERS has invalid value '{v}'"))?,
        Err(_) => DEFAULT_DEMO_USERS,
    };
    let demo_password =
        std::env::var("SEED_DEMO_PASSWORD").unwrap_or_else(|_| DEFAULT_DEMO_PASSWORD.into());

    let pool = kindred_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    kindred_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let admin_created = seed_admin(&pool, &admin_email, &admin_password).await?;
    let members = seed_members(&pool, demo_users, &demo_password).await?;

    tracing::info!(
        admin_created,
        members_created = members.created,
        members_repaired = members.repaired,
        members_skipped = demo_users - members.created - members.repaired,
        "Seeding complete"
    );
    pool.close().await;
    Ok(())
}

fn hash(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))
}

async fn role_id(pool: &DbPool, name: &str) -> anyhow::Result<i64> {
    let role = RoleRepo::find_by_name(pool, name)
        .await?
        .with_context(|| format!("Role '{name}' is missing; migrations incomplete?"))?;
    Ok(role.id)
}

async fn seed_admin(pool: &DbPool, email: &str, password: &str) -> anyhow::Result<bool> {
    let input = CreateUser {
        email: email.to_string(),
        password_hash: hash(password)?,
        role_id: role_id(pool, ROLE_ADMIN).await?,
    };
    let Some(admin) = UserRepo::create_if_absent(pool, &input).await? else {
        let existing = UserRepo::find_by_email(pool, email)
            .await?
            .with_context(|| format!("Admin {email} vanished during seeding"))?;
        if ensure_free_plan(pool, existing.id).await? {
            tracing::info!(user_id = existing.id, email, "Admin subscription restored");
        } else {
            tracing::info!(email, "Admin already exists");
        }
        return Ok(false);
    };
    SubscriptionRepo::create_free(pool, admin.id).await?;
    tracing::info!(user_id = admin.id, email, "Admin created");
    Ok(true)
}

/// Open a free subscription unless the user already has an active one.
async fn ensure_free_plan(pool: &DbPool, user_id: i64) -> anyhow::Result<bool> {
    if SubscriptionRepo::find_active(pool, user_id).await?.is_some() {
        return Ok(false);
    }
    SubscriptionRepo::create_free(pool, user_id).await?;
    Ok(true)
}

/// The deterministic profile of demo member `i`.
fn demo_profile(i: u32) -> UpsertProfile {
    let idx = i as usize;
    let (city, lat, lon) = CITIES[idx % CITIES.len()];
    let gender = GENDERS[idx % GENDERS.len()];
    // Everyone is open to the two other genders, plus their own on odd rows.
    let mut interested_in: Vec<String> = GENDERS
        .iter()
        .filter(|g| **g != gender || i % 2 == 1)
        .map(|g| g.to_string())
        .collect();
    interested_in.sort();
    let interests = (0..3)
        .map(|k| INTERESTS[(idx + k * 3) % INTERESTS.len()].to_string())
        .collect();
    let birthdate = NaiveDate::from_ymd_opt(1986 + (i % 15) as i32, 1 + i % 12, 1 + i % 28)
        .unwrap_or(NaiveDate::MIN);
    let name = NAMES[idx % NAMES.len()];

    UpsertProfile {
        display_name: name.to_string(),
        birthdate,
        gender: gender.to_string(),
        interested_in,
        bio: Some(format!("{name} from {city}, demo account #{i}")),
        city: Some(city.to_string()),
        latitude: Some(lat),
        longitude: Some(lon),
        interests,
        min_age_pref: 18,
        max_age_pref: 60,
        max_distance_km: 350,
    }
}

/// What one seeding pass did to the demo accounts.
#[derive(Debug, Default, PartialEq, Eq)]
struct MemberCounts {
    created: u32,
    /// Existing accounts that were missing a profile or subscription.
    repaired: u32,
}

async fn seed_members(pool: &DbPool, count: u32, password: &str) -> anyhow::Result<MemberCounts> {
    let member_role = role_id(pool, ROLE_MEMBER).await?;
    // One hash shared by every demo account keeps seeding fast.
    let password_hash = hash(password)?;
    let mut counts = MemberCounts::default();

    for i in 1..=count {
        let input = CreateUser {
            email: format!("demo{i:03}@kindred.local"),
            password_hash: password_hash.clone(),
            role_id: member_role,
        };
        let (user_id, created) = match UserRepo::create_if_absent(pool, &input).await? {
            Some(user) => (user.id, true),
            None => {
                let existing = UserRepo::find_by_email(pool, &input.email)
                    .await?
                    .with_context(|| format!("{} vanished during seeding", input.email))?;
                (existing.id, false)
            }
        };

        let mut filled = false;
        if ProfileRepo::find_by_user(pool, user_id).await?.is_none() {
            ProfileRepo::upsert(pool, user_id, &demo_profile(i))
                .await
                .with_context(|| format!("Failed to create profile for {}", input.email))?;
            filled = true;
        }
        filled |= ensure_free_plan(pool, user_id).await?;

        if created {
            counts.created += 1;
        } else if filled {
            tracing::info!(user_id, email = %input.email, "Half-seeded demo member repaired");
            counts.repaired += 1;
        }
    }

    Ok(counts)
}
