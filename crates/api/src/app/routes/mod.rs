use axum::{
    routing::{get, patch, post},
    Router,
};

pub mod books;
pub mod orders;
pub mod ratings;
pub mod system;
pub mod users;
pub mod wishlist;

/// Endpoints open to anyone.
pub fn public_router() -> Router {
    Router::new()
        .route("/", get(system::root))
        .route("/health", get(system::health))
        .route("/users", post(users::create_user).get(users::list_users))
        .route("/users/role/:email", get(users::get_role))
        .route(
            "/users/profile/:email",
            get(users::get_profile).patch(users::update_profile),
        )
        .route("/users/:id/role", patch(users::set_role))
        .route("/books", post(books::create_book).get(books::list_books))
        .route(
            "/books/:id",
            get(books::get_book)
                .patch(books::set_book_status)
                .delete(books::delete_book),
        )
        .route("/books/edit/:id", patch(books::edit_book))
        .route("/my-books", get(books::my_books))
        .route("/wishlist/id", get(wishlist::list_entries))
        .route("/wishlist/:book_id", axum::routing::delete(wishlist::remove_entry))
        .route("/orders", post(orders::create_order))
        .route("/orders/:id", get(orders::get_order))
        .route("/my-orders", get(orders::my_orders))
        .route("/orders/librarian/:email", get(orders::librarian_orders))
        .route("/orders/cancel/:id", patch(orders::cancel_order))
        .route("/orders/status/:id", patch(orders::advance_order))
        .route("/ratings", post(ratings::submit_rating))
        .route("/ratings/:book_id", get(ratings::book_ratings))
}

/// Endpoints that need a verified caller.
pub fn protected_router() -> Router {
    Router::new().route(
        "/wishlist",
        post(wishlist::add_entry).get(wishlist::list_mine),
    )
}
