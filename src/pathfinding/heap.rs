/// Двоичная min-куча пар (значение, приоритет).
///
/// Операции уменьшения ключа нет: поиск кладёт клетку повторно с меньшим
/// приоритетом и сам отбрасывает устаревшие дубликаты при извлечении.
#[derive(Debug, Clone)]
pub struct PriorityQueue<T, P> {
    items: Vec<(T, P)>,
}

impl<T, P: PartialOrd> Default for PriorityQueue<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, P: PartialOrd> PriorityQueue<T, P> {
    #[must_use]
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    #[must_use]
    pub fn peek(&self) -> Option<(&T, &P)> {
        self.items.first().map(|(item, priority)| (item, priority))
    }

    pub fn push(&mut self, item: T, priority: P) {
        self.items.push((item, priority));
        self.sift_up(self.items.len() - 1);
    }

    pub fn pop_min(&mut self) -> Option<(T, P)> {
        if self.items.is_empty() {
            return None;
        }
        let last = self.items.len() - 1;
        self.items.swap(0, last);
        let min = self.items.pop();
        if !self.items.is_empty() {
            self.sift_down(0);
        }
        min
    }

    fn less(&self, a: usize, b: usize) -> bool {
        self.items[a].1 < self.items[b].1
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if !self.less(i, parent) {
                break;
            }
            self.items.swap(i, parent);
            i = parent;
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let n = self.items.len();
        loop {
            let left = 2 * i + 1;
            let right = left + 1;
            let mut smallest = i;
            if left < n && self.less(left, smallest) {
                smallest = left;
            }
            if right < n && self.less(right, smallest) {
                smallest = right;
            }
            if smallest == i {
                break;
            }
            self.items.swap(i, smallest);
            i = smallest;
        }
    }
}
