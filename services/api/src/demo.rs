use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use zameen_hub::error::AppError;
use zameen_hub::marketplace::{
    ApprovalStatus, ApprovalSubject, FileStorage, FurnishingStatus, ImageUpload, InMemoryIdentityProvider,
    InMemoryObjectStorage, InMemoryStore, KeyValueStorage, ListingFilter, LocalFavorites,
    MarketplaceError, MarketplaceState, MemoryStorage, Profile, PropertyDraft, PropertyId,
    PropertyType, ServiceRoleKey, SignUpOutcome, SignUpRequest, UserRole,
};

type DemoMarketplace =
    MarketplaceState<InMemoryStore, InMemoryIdentityProvider, InMemoryObjectStorage>;

// Smallest valid PNG header; enough for the demo uploads.
const PNG_STUB: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Keep the visitor's anonymous favorites in this directory instead of memory.
    #[arg(long)]
    pub(crate) favorites_dir: Option<PathBuf>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let service_key = ServiceRoleKey::generate();
    let marketplace = MarketplaceState::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(InMemoryIdentityProvider::new(service_key.clone())),
        Arc::new(InMemoryObjectStorage::new(
            "http://127.0.0.1:3000/storage/v1/object/public",
        )),
        service_key.clone(),
        Duration::from_secs(1),
    );

    println!("ZameenHub marketplace demo");
    let admin = marketplace.accounts.provision_account(
        &service_key,
        SignUpRequest {
            email: "admin@zameenhub.pk".to_string(),
            password: "admin-pass".to_string(),
            full_name: Some("Site Admin".to_string()),
            phone: None,
            role: UserRole::Admin,
            agency_name: None,
        },
    )?;
    println!("- Provisioned admin {}", admin.id);

    let dealer = onboard_dealer(&marketplace, &admin)?;
    let listings = publish_listings(&marketplace, &admin, &dealer)?;

    match args.favorites_dir {
        Some(dir) => {
            let storage = FileStorage::open(&dir)?;
            println!("\nVisitor favorites kept in {}", dir.display());
            browse_as_visitor(&marketplace, &listings, LocalFavorites::new(storage))?;
        }
        None => browse_as_visitor(
            &marketplace,
            &listings,
            LocalFavorites::new(MemoryStorage::default()),
        )?,
    }

    let stats = marketplace.moderation.stats(&admin)?;
    println!("\nModeration dashboard");
    println!(
        "- {} listings ({} pending, {} approved)",
        stats.total_properties, stats.pending_properties, stats.approved_properties
    );
    println!(
        "- {} dealers ({} pending) | {} accounts in total",
        stats.total_dealers, stats.pending_dealers, stats.total_users
    );
    Ok(())
}

fn onboard_dealer(marketplace: &DemoMarketplace, admin: &Profile) -> Result<Profile, AppError> {
    println!("\nDealer onboarding");
    let mut no_favorites = LocalFavorites::new(MemoryStorage::default());
    let outcome = marketplace.accounts.sign_up(
        SignUpRequest {
            email: "bilal@karachi-estates.pk".to_string(),
            password: "dealer-pass".to_string(),
            full_name: Some("Bilal Ahmed".to_string()),
            phone: Some("+92 300 1234567".to_string()),
            role: UserRole::Dealer,
            agency_name: Some("Karachi Estates".to_string()),
        },
        &mut no_favorites,
    )?;
    let SignUpOutcome::AwaitingApproval { profile } = outcome else {
        let reason = "dealer sign-up did not enter the approval queue".to_string();
        return Err(MarketplaceError::Conflict(reason).into());
    };
    println!("- {} registered; status {}", profile.id, profile.approval_status);

    match marketplace
        .accounts
        .sign_in("bilal@karachi-estates.pk", "dealer-pass", &mut no_favorites)
    {
        Err(MarketplaceError::SignInDenied(denial)) => println!("- Sign-in blocked: {denial}"),
        Err(error) => return Err(error.into()),
        Ok(_) => println!("- Sign-in unexpectedly allowed"),
    }

    let mut subscription = marketplace
        .notifier
        .subscribe(Some(ApprovalSubject::Dealer(profile.id)));
    let approved = marketplace
        .moderation
        .set_dealer_approval(admin, &profile.id, ApprovalStatus::Approved)?;
    if let Some(event) = subscription.try_recv() {
        println!(
            "- Notified: dealer {} -> {} (was {})",
            profile.id, event.status, event.previous
        );
    }
    subscription.unsubscribe();
    Ok(approved)
}

fn publish_listings(
    marketplace: &DemoMarketplace,
    admin: &Profile,
    dealer: &Profile,
) -> Result<Vec<PropertyId>, AppError> {
    println!("\nListings");
    let drafts = [
        ("Corner house in DHA Phase 6", PropertyType::House, "Karachi", Some(45_000_000), Some(5)),
        ("Sea-view apartment in Clifton", PropertyType::Apartment, "Karachi", Some(18_500_000), Some(3)),
        ("Family home in Gulshan", PropertyType::House, "Karachi", Some(3_800_000), Some(3)),
        ("Commercial plaza in Blue Area", PropertyType::Commercial, "Islamabad", None, None),
    ];

    let mut ids = Vec::new();
    for (index, (title, property_type, city, price, bedrooms)) in drafts.into_iter().enumerate() {
        let draft = PropertyDraft {
            title: title.to_string(),
            description: None,
            property_type,
            price,
            city: city.to_string(),
            area: None,
            address: None,
            bedrooms,
            bathrooms: bedrooms.map(|rooms| rooms.saturating_sub(1).max(1)),
            furnishing: Some(FurnishingStatus::Unfurnished),
        };
        let images = vec![ImageUpload::new(format!("photo-{index}.png"), PNG_STUB.to_vec())];
        let listing = marketplace.catalog.create_listing(dealer, draft, images)?;
        println!(
            "- {} [{}] with {} image(s)",
            listing.property.title,
            listing.property.approval_status,
            listing.images.len()
        );
        ids.push(listing.property.id);
    }

    let before = marketplace.catalog.search(ListingFilter::default())?.len();
    println!("- Public catalog before moderation: {before} listing(s)");

    // Approve all but the last; the plaza stays in the queue.
    for id in &ids[..ids.len() - 1] {
        marketplace
            .moderation
            .set_property_approval(admin, id, ApprovalStatus::Approved)?;
    }
    let after = marketplace.catalog.search(ListingFilter::default())?.len();
    println!("- Public catalog after moderation: {after} listing(s)");
    Ok(ids)
}

fn browse_as_visitor<L: KeyValueStorage>(
    marketplace: &DemoMarketplace,
    listings: &[PropertyId],
    mut local: LocalFavorites<L>,
) -> Result<(), AppError> {
    println!("\nVisitor");
    let filter = ListingFilter {
        property_type: Some(PropertyType::House),
        city: Some("Karachi".to_string()),
        min_price: Some(5_000_000),
        ..ListingFilter::default()
    };
    for view in marketplace.catalog.search(filter)? {
        let agency = view
            .owner
            .as_ref()
            .and_then(|owner| owner.agency_name.clone())
            .unwrap_or_default();
        println!(
            "- Houses in Karachi from PKR 5,000,000: {} ({}) {}",
            view.property.title,
            view.property.price.unwrap_or_default(),
            agency
        );
    }

    for id in listings.iter().take(2) {
        local.add(*id)?;
    }
    println!("- Saved {} listing(s) before signing up", local.load().len());

    let outcome = marketplace.accounts.sign_up(
        SignUpRequest {
            email: "ayesha@example.pk".to_string(),
            password: "buyer-pass".to_string(),
            full_name: Some("Ayesha Khan".to_string()),
            phone: None,
            role: UserRole::User,
            agency_name: None,
        },
        &mut local,
    )?;
    if let SignUpOutcome::Registered { profile, merge, .. } = outcome {
        println!("- Signed up; favorites merge: {merge:?}");
        println!("- Local favorites left: {}", local.load().len());
        let saved = marketplace.catalog.saved_listings(&profile)?;
        for view in saved {
            println!("  * {}", view.property.title);
        }
        let contact = marketplace.catalog.reveal_contact(&profile, &listings[0])?;
        println!(
            "- Contact for '{}': {}",
            listings[0],
            contact.phone.unwrap_or_else(|| "not listed".to_string())
        );
    }
    Ok(())
}
