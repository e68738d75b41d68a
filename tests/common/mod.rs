//! Shared fixtures: an in-memory library database and an instrumented cache store.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use model_cache::cache::CacheEntry;
use model_cache::{
    CacheKey, CacheMediator, CacheStore, CachingConfig, DataAccess, Error, MemoryStore,
    QueryDescription, TagSet,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: u64,
    pub title: String,
    pub author_id: u64,
    pub author: Option<Author>,
}

#[derive(Debug)]
pub enum DbError {
    Cache(Error),
    Constraint(String),
}

impl From<Error> for DbError {
    fn from(e: Error) -> Self {
        DbError::Cache(e)
    }
}

#[derive(Default)]
pub struct Database {
    authors: Mutex<Vec<Author>>,
    books: Mutex<Vec<Book>>,
    pub queries: AtomicUsize,
}

impl Database {
    pub fn seeded(authors: usize, books_per_author: usize) -> Arc<Self> {
        let db = Self::default();
        {
            let mut a = db.authors.lock().unwrap();
            let mut b = db.books.lock().unwrap();
            for i in 1..=authors as u64 {
                a.push(Author {
                    id: i,
                    name: format!("author-{i}"),
                });
                for j in 0..books_per_author as u64 {
                    let id = b.len() as u64 + 1;
                    b.push(Book {
                        id,
                        title: format!("book-{i}-{j}"),
                        author_id: i,
                        author: None,
                    });
                }
            }
        }
        Arc::new(db)
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

pub struct Authors(pub Arc<Database>);

pub enum AuthorWrite {
    Create(String),
    Rename { id: u64, name: String },
    Delete(u64),
}

#[async_trait]
impl DataAccess for Authors {
    type Record = Author;
    type Write = AuthorWrite;
    type Output = u64;
    type Error = DbError;

    fn entity(&self) -> &str {
        "Author"
    }

    async fn fetch(&self, query: &QueryDescription) -> Result<Vec<Author>, DbError> {
        self.0.queries.fetch_add(1, Ordering::SeqCst);
        let authors = self.0.authors.lock().unwrap();
        let limit = query.pagination.limit.unwrap_or(u64::MAX) as usize;
        Ok(authors.iter().take(limit).cloned().collect())
    }

    async fn persist(&self, write: AuthorWrite) -> Result<u64, DbError> {
        let mut authors = self.0.authors.lock().unwrap();
        match write {
            AuthorWrite::Create(name) => {
                let id = authors.iter().map(|a| a.id).max().unwrap_or(0) + 1;
                authors.push(Author { id, name });
                Ok(id)
            }
            AuthorWrite::Rename { id, name } => {
                let author = authors
                    .iter_mut()
                    .find(|a| a.id == id)
                    .ok_or_else(|| DbError::Constraint(format!("no author {id}")))?;
                author.name = name;
                Ok(id)
            }
            AuthorWrite::Delete(id) => {
                authors.retain(|a| a.id != id);
                self.0.books.lock().unwrap().retain(|b| b.author_id != id);
                Ok(id)
            }
        }
    }

    fn affected_entities(&self, write: &AuthorWrite) -> Vec<String> {
        match write {
            // Deleting cascades to the author's books.
            AuthorWrite::Delete(_) => vec!["Book".to_string()],
            _ => Vec::new(),
        }
    }
}

pub struct Books(pub Arc<Database>);

pub struct NewBook {
    pub title: String,
    pub author_id: u64,
}

#[async_trait]
impl DataAccess for Books {
    type Record = Book;
    type Write = NewBook;
    type Output = u64;
    type Error = DbError;

    fn entity(&self) -> &str {
        "Book"
    }

    async fn fetch(&self, query: &QueryDescription) -> Result<Vec<Book>, DbError> {
        self.0.queries.fetch_add(1, Ordering::SeqCst);
        let books = self.0.books.lock().unwrap().clone();
        if !query.relations.iter().any(|r| r.name == "author") {
            return Ok(books);
        }
        let authors = self.0.authors.lock().unwrap();
        Ok(books
            .into_iter()
            .map(|mut b| {
                b.author = authors.iter().find(|a| a.id == b.author_id).cloned();
                b
            })
            .collect())
    }

    async fn persist(&self, write: NewBook) -> Result<u64, DbError> {
        if !self.0.authors.lock().unwrap().iter().any(|a| a.id == write.author_id) {
            return Err(DbError::Constraint(format!("no author {}", write.author_id)));
        }
        let mut books = self.0.books.lock().unwrap();
        let id = books.len() as u64 + 1;
        books.push(Book {
            id,
            title: write.title,
            author_id: write.author_id,
            author: None,
        });
        Ok(id)
    }
}

/// Store wrapper that counts calls and can simulate an outage.
pub struct CountingStore {
    inner: MemoryStore,
    pub gets: AtomicUsize,
    pub puts: AtomicUsize,
    pub forgets: AtomicUsize,
    failing: AtomicBool,
}

impl CountingStore {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::named(name, 1000),
            gets: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
            forgets: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn forgets(&self) -> usize {
        self.forgets.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn check(&self) -> model_cache::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::store_unavailable(self.inner.name(), "connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for CountingStore {
    async fn get(&self, key: &CacheKey) -> model_cache::Result<Option<CacheEntry>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.get(key).await
    }

    async fn put(
        &self,
        key: &CacheKey,
        value: Vec<u8>,
        tags: &TagSet,
        ttl: Option<Duration>,
    ) -> model_cache::Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.put(key, value, tags, ttl).await
    }

    async fn forget(&self, key: &CacheKey) -> model_cache::Result<bool> {
        self.check()?;
        self.inner.forget(key).await
    }

    async fn forget_by_tag(&self, tag: &str) -> model_cache::Result<u64> {
        self.forgets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.forget_by_tag(tag).await
    }

    async fn len(&self) -> model_cache::Result<usize> {
        self.inner.len().await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

pub fn test_config() -> CachingConfig {
    CachingConfig::new()
        .with_namespace("library")
        .with_environment("testing")
}

/// Mediator over one counting store registered as the default.
pub fn counting_mediator(config: CachingConfig) -> (Arc<CacheMediator>, Arc<CountingStore>) {
    let store = CountingStore::new(&config.store);
    let mediator = CacheMediator::builder()
        .with_store(config.store.clone(), store.clone())
        .with_config(config)
        .build()
        .unwrap();
    (Arc::new(mediator), store)
}
