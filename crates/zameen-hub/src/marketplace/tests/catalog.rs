use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use super::common::*;

use crate::marketplace::catalog::CatalogService;
use crate::marketplace::domain::{
    ApprovalStatus, PropertyChanges, PropertyId, PropertyStatus, PropertyType, ValidationError,
};
use crate::marketplace::listing::{ListingFilter, SortOrder, StatusFilter};
use crate::marketplace::repository::{ContactRepository, PropertyRepository};
use crate::marketplace::storage::PROPERTY_IMAGES_BUCKET;
use crate::marketplace::MarketplaceError;

fn public_ids(h: &Harness, filter: ListingFilter) -> Vec<PropertyId> {
    h.state
        .catalog
        .search(filter)
        .expect("search succeeds")
        .into_iter()
        .map(|view| view.property.id)
        .collect()
}

#[test]
fn public_catalog_holds_exactly_the_approved_listings() {
    let h = harness();
    let admin = h.admin();
    let dealer = h.approved_dealer("dealer@zameenhub.test");

    let pending = h.listing(&dealer, karachi_house("Pending house", 9_000_000));
    let approved = h.approved_listing(&admin, &dealer, karachi_house("Approved house", 9_000_000));
    let rejected = h.listing(&dealer, karachi_house("Rejected house", 9_000_000));
    h.decide(&admin, &rejected, ApprovalStatus::Rejected);

    assert_eq!(public_ids(&h, ListingFilter::default()), vec![approved]);

    // Decisions show up in the very next query, in either direction.
    h.decide(&admin, &pending, ApprovalStatus::Approved);
    h.decide(&admin, &approved, ApprovalStatus::Rejected);
    assert_eq!(public_ids(&h, ListingFilter::default()), vec![pending]);
}

#[test]
fn house_in_karachi_from_five_million_newest_first() {
    let h = harness();
    let admin = h.admin();
    let dealer = h.approved_dealer("dealer@zameenhub.test");

    let older = h.approved_listing(&admin, &dealer, karachi_house("DHA bungalow", 45_000_000));
    sleep(Duration::from_millis(2));
    h.approved_listing(&admin, &dealer, karachi_house("Gulshan house", 3_800_000));
    h.approved_listing(
        &admin,
        &dealer,
        draft("Clifton flat", PropertyType::Apartment, "Karachi", Some(18_500_000), Some(3)),
    );
    h.approved_listing(
        &admin,
        &dealer,
        draft("Gulberg house", PropertyType::House, "Lahore", Some(9_000_000), Some(4)),
    );
    h.approved_listing(
        &admin,
        &dealer,
        draft("Unpriced house", PropertyType::House, "Karachi", None, Some(2)),
    );
    sleep(Duration::from_millis(2));
    let newer = h.approved_listing(&admin, &dealer, karachi_house("PECHS house", 5_000_000));
    h.listing(&dealer, karachi_house("Unmoderated house", 20_000_000));

    let filter = ListingFilter {
        property_type: Some(PropertyType::House),
        city: Some("Karachi".to_string()),
        min_price: Some(5_000_000),
        ..ListingFilter::default()
    };
    assert_eq!(public_ids(&h, filter.clone()), vec![newer, older]);

    let cheapest_first = ListingFilter {
        sort_by: SortOrder::PriceAscending,
        ..filter
    };
    assert_eq!(public_ids(&h, cheapest_first), vec![newer, older]);
}

#[test]
fn search_results_carry_images_and_owner_contact() {
    let h = harness();
    let admin = h.admin();
    let dealer = h.approved_dealer("dealer@zameenhub.test");
    let listing = h
        .state
        .catalog
        .create_listing(
            &dealer,
            karachi_house("Corner house", 9_000_000),
            vec![photo("front.png"), photo("lounge.JPG")],
        )
        .expect("listing created");
    h.decide(&admin, &listing.property.id, ApprovalStatus::Approved);

    let results = h.state.catalog.search(ListingFilter::default()).expect("search");
    assert_eq!(results.len(), 1);
    let view = &results[0];
    let orders: Vec<u32> = view.images.iter().map(|image| image.display_order).collect();
    assert_eq!(orders, vec![0, 1]);
    let owner = view.owner.as_ref().expect("owner fields joined");
    assert_eq!(owner.agency_name.as_deref(), Some("Test Realty"));
    assert_eq!(owner.phone.as_deref(), Some("+92 321 0000000"));
}

#[test]
fn new_listings_enter_moderation_with_uploaded_photos() {
    let h = harness();
    let dealer = h.approved_dealer("dealer@zameenhub.test");

    let view = h
        .state
        .catalog
        .create_listing(
            &dealer,
            karachi_house("Corner house", 9_000_000),
            vec![photo("front.png"), photo("lounge.JPG")],
        )
        .expect("listing created");

    assert_eq!(view.property.approval_status, ApprovalStatus::Pending);
    assert_eq!(view.property.status, PropertyStatus::Available);
    assert!(!view.property.featured);
    assert_eq!(view.images.len(), 2);
    assert_eq!(h.storage.object_count(), 2);

    let prefix = format!(
        "{STORAGE_URL}/{PROPERTY_IMAGES_BUCKET}/{}/{}/",
        dealer.id, view.property.id
    );
    for image in &view.images {
        assert!(image.image_url.starts_with(&prefix), "{}", image.image_url);
    }
    assert!(view.images[1].image_url.ends_with("-1.jpg"));

    let path = view.images[1]
        .image_url
        .trim_start_matches(&format!("{STORAGE_URL}/{PROPERTY_IMAGES_BUCKET}/"))
        .to_string();
    let stored = h
        .storage
        .object(PROPERTY_IMAGES_BUCKET, &path)
        .expect("object stored");
    assert_eq!(stored.content_type, "image/jpeg");
}

#[test]
fn only_admins_and_approved_dealers_may_list() {
    let h = harness();
    let admin = h.admin();
    let pending = h.pending_dealer("pending@zameenhub.test");
    let (user, _) = h.user("ayesha@example.pk");

    for actor in [&pending, &user] {
        assert!(matches!(
            h.state
                .catalog
                .create_listing(actor, karachi_house("Nope", 1), Vec::new()),
            Err(MarketplaceError::Forbidden(_))
        ));
    }

    let by_admin = h
        .state
        .catalog
        .create_listing(&admin, karachi_house("Admin listing", 1), Vec::new())
        .expect("admins may list");
    assert_eq!(by_admin.property.approval_status, ApprovalStatus::Pending);
}

#[test]
fn invalid_drafts_and_non_images_write_nothing() {
    let h = harness();
    let admin = h.admin();
    let dealer = h.approved_dealer("dealer@zameenhub.test");

    let brochure = h.state.catalog.create_listing(
        &dealer,
        karachi_house("Corner house", 9_000_000),
        vec![photo("front.png"), photo("brochure.pdf")],
    );
    assert!(matches!(
        brochure,
        Err(MarketplaceError::Validation(ValidationError::UnsupportedImage { .. }))
    ));

    let untitled = h
        .state
        .catalog
        .create_listing(&dealer, karachi_house("  ", 9_000_000), Vec::new());
    assert!(matches!(
        untitled,
        Err(MarketplaceError::Validation(ValidationError::MissingField("title")))
    ));

    let queue = h
        .state
        .moderation
        .property_queue(&admin, StatusFilter::All)
        .expect("queue");
    assert!(queue.is_empty());
    assert_eq!(h.storage.object_count(), 0);
}

#[test]
fn failed_uploads_are_skipped_but_the_listing_is_kept() {
    let h = harness();
    let dealer = h.approved_dealer("dealer@zameenhub.test");
    let catalog = CatalogService::new(Arc::clone(&h.store), Arc::new(UnavailableStorage));

    let view = catalog
        .create_listing(
            &dealer,
            karachi_house("Corner house", 9_000_000),
            vec![photo("front.png")],
        )
        .expect("listing kept");

    assert!(view.images.is_empty());
    assert!(h
        .store
        .fetch_property(&view.property.id)
        .expect("readable")
        .is_some());
}

#[test]
fn unapproved_listings_read_as_missing_to_strangers() {
    let h = harness();
    let admin = h.admin();
    let dealer = h.approved_dealer("dealer@zameenhub.test");
    let (stranger, _) = h.user("ayesha@example.pk");
    let pending = h.listing(&dealer, karachi_house("Corner house", 9_000_000));

    for viewer in [None, Some(&stranger)] {
        assert!(matches!(
            h.state.catalog.get_listing(viewer, &pending),
            Err(MarketplaceError::NotFound("property"))
        ));
    }
    assert!(h.state.catalog.get_listing(Some(&dealer), &pending).is_ok());
    assert!(h.state.catalog.get_listing(Some(&admin), &pending).is_ok());

    h.decide(&admin, &pending, ApprovalStatus::Approved);
    assert!(h.state.catalog.get_listing(None, &pending).is_ok());
}

#[test]
fn owners_and_admins_edit_without_touching_moderation() {
    let h = harness();
    let admin = h.admin();
    let dealer = h.approved_dealer("dealer@zameenhub.test");
    let other = h.approved_dealer("other@zameenhub.test");
    let listing = h.approved_listing(&admin, &dealer, karachi_house("Corner house", 9_000_000));

    let price_cut = PropertyChanges {
        price: Some(Some(8_500_000)),
        status: Some(PropertyStatus::Sold),
        ..PropertyChanges::default()
    };
    assert!(matches!(
        h.state
            .catalog
            .update_listing(&other, &listing, price_cut.clone()),
        Err(MarketplaceError::Forbidden(_))
    ));

    let updated = h
        .state
        .catalog
        .update_listing(&dealer, &listing, price_cut)
        .expect("owner edits");
    assert_eq!(updated.property.price, Some(8_500_000));
    assert_eq!(updated.property.status, PropertyStatus::Sold);
    assert_eq!(updated.property.approval_status, ApprovalStatus::Approved);

    let renamed = h
        .state
        .catalog
        .update_listing(
            &admin,
            &listing,
            PropertyChanges {
                title: Some("Corner house, DHA".to_string()),
                ..PropertyChanges::default()
            },
        )
        .expect("admin edits");
    assert_eq!(renamed.property.title, "Corner house, DHA");
}

#[test]
fn deleting_a_listing_removes_its_images_and_favorites() {
    let h = harness();
    let admin = h.admin();
    let dealer = h.approved_dealer("dealer@zameenhub.test");
    let (buyer, _) = h.user("ayesha@example.pk");
    let listing = h
        .state
        .catalog
        .create_listing(
            &dealer,
            karachi_house("Corner house", 9_000_000),
            vec![photo("front.png")],
        )
        .expect("listing created")
        .property
        .id;
    h.decide(&admin, &listing, ApprovalStatus::Approved);
    h.state.catalog.save_favorite(&buyer, &listing).expect("saved");
    h.state
        .catalog
        .reveal_contact(&buyer, &listing)
        .expect("revealed");

    assert!(matches!(
        h.state.catalog.delete_listing(&buyer, &listing),
        Err(MarketplaceError::Forbidden(_))
    ));
    assert!(h
        .state
        .catalog
        .delete_listing(&dealer, &listing)
        .expect("owner deletes"));

    assert!(h.store.images_for(&listing).expect("readable").is_empty());
    assert!(saved_ids(&h.store, &buyer.id).is_empty());
    assert!(h.store.contacts_for(&listing).expect("readable").is_empty());
    assert!(!h
        .state
        .catalog
        .delete_listing(&dealer, &listing)
        .expect("deleting twice is a no-op"));
}

#[test]
fn favorites_save_toggle_and_remove() {
    let h = harness();
    let admin = h.admin();
    let dealer = h.approved_dealer("dealer@zameenhub.test");
    let (buyer, _) = h.user("ayesha@example.pk");
    let listing = h.approved_listing(&admin, &dealer, karachi_house("Corner house", 9_000_000));
    let pending = h.listing(&dealer, karachi_house("Pending house", 9_000_000));

    assert!(h.state.catalog.save_favorite(&buyer, &listing).expect("saved"));
    assert!(!h
        .state
        .catalog
        .save_favorite(&buyer, &listing)
        .expect("saving twice is fine"));
    assert_eq!(saved_ids(&h.store, &buyer.id), vec![listing]);

    assert!(!h.state.catalog.toggle_favorite(&buyer, &listing).expect("toggle off"));
    assert!(!h.state.catalog.is_favorite(&buyer.id, &listing).expect("readable"));
    assert!(h.state.catalog.toggle_favorite(&buyer, &listing).expect("toggle on"));
    assert!(h
        .state
        .catalog
        .remove_favorite(&buyer.id, &listing)
        .expect("removed"));
    assert!(!h
        .state
        .catalog
        .remove_favorite(&buyer.id, &listing)
        .expect("nothing left to remove"));

    assert!(matches!(
        h.state.catalog.save_favorite(&buyer, &pending),
        Err(MarketplaceError::NotFound("property"))
    ));
}

#[test]
fn saved_listings_are_newest_saved_first_and_public_only() {
    let h = harness();
    let admin = h.admin();
    let dealer = h.approved_dealer("dealer@zameenhub.test");
    let (buyer, _) = h.user("ayesha@example.pk");
    let first = h.approved_listing(&admin, &dealer, karachi_house("First", 9_000_000));
    let second = h.approved_listing(&admin, &dealer, karachi_house("Second", 9_000_000));
    let withdrawn = h.approved_listing(&admin, &dealer, karachi_house("Withdrawn", 9_000_000));

    for id in [&first, &withdrawn, &second] {
        h.state.catalog.save_favorite(&buyer, id).expect("saved");
        sleep(Duration::from_millis(2));
    }
    h.decide(&admin, &withdrawn, ApprovalStatus::Rejected);

    let saved: Vec<PropertyId> = h
        .state
        .catalog
        .saved_listings(&buyer)
        .expect("saved listings")
        .into_iter()
        .map(|view| view.property.id)
        .collect();
    assert_eq!(saved, vec![second, first]);
}

#[test]
fn anonymous_lookup_returns_public_listings_in_request_order() {
    let h = harness();
    let admin = h.admin();
    let dealer = h.approved_dealer("dealer@zameenhub.test");
    let a = h.approved_listing(&admin, &dealer, karachi_house("A", 9_000_000));
    let b = h.approved_listing(&admin, &dealer, karachi_house("B", 9_000_000));
    let pending = h.listing(&dealer, karachi_house("Pending", 9_000_000));

    let found: Vec<PropertyId> = h
        .state
        .catalog
        .lookup_public(&[b, PropertyId::new(), pending, a])
        .expect("lookup")
        .into_iter()
        .map(|view| view.property.id)
        .collect();
    assert_eq!(found, vec![b, a]);
}

#[test]
fn revealing_a_contact_is_logged() {
    let h = harness();
    let admin = h.admin();
    let dealer = h.approved_dealer("dealer@zameenhub.test");
    let (buyer, _) = h.user("ayesha@example.pk");
    let listing = h.approved_listing(&admin, &dealer, karachi_house("Corner house", 9_000_000));

    let contact = h
        .state
        .catalog
        .reveal_contact(&buyer, &listing)
        .expect("contact revealed");
    assert_eq!(contact, dealer.public_contact());

    let log = h.store.contacts_for(&listing).expect("readable");
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].user_id, buyer.id);
}

#[test]
fn dealer_dashboard_lists_own_listings_by_status() {
    let h = harness();
    let admin = h.admin();
    let dealer = h.approved_dealer("dealer@zameenhub.test");
    let other = h.approved_dealer("other@zameenhub.test");
    let live = h.approved_listing(&admin, &dealer, karachi_house("Live", 9_000_000));
    let waiting = h.listing(&dealer, karachi_house("Waiting", 9_000_000));
    h.listing(&other, karachi_house("Someone else's", 9_000_000));

    let mine = |status| -> Vec<PropertyId> {
        h.state
            .catalog
            .owner_listings(&dealer, status)
            .expect("dashboard")
            .into_iter()
            .map(|view| view.property.id)
            .collect()
    };
    assert_eq!(mine(StatusFilter::Pending), vec![waiting]);
    assert_eq!(mine(StatusFilter::Approved), vec![live]);
    assert!(mine(StatusFilter::Rejected).is_empty());
    assert_eq!(mine(StatusFilter::All).len(), 2);
}
